use serde::Deserialize;
use types::{
    containers::{BlobSidecar, SignedBeaconBlockHeader},
    primitives::H256,
};

#[derive(Deserialize)]
pub struct HeaderResponse {
    pub data: HeaderData,
}

#[derive(Deserialize)]
pub struct HeaderData {
    pub root: H256,
    pub canonical: bool,
    pub header: SignedBeaconBlockHeader,
}

#[derive(Deserialize)]
pub struct BlobSidecarsResponse {
    pub data: Vec<BlobSidecar>,
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use super::*;

    #[test]
    fn header_response_ignores_metadata_fields() -> Result<()> {
        let json = json!({
            "execution_optimistic": false,
            "finalized": true,
            "data": {
                "root": "0x0101010101010101010101010101010101010101010101010101010101010101",
                "canonical": true,
                "header": {
                    "message": {
                        "slot": "1000",
                        "proposer_index": "7",
                        "parent_root": "0x0202020202020202020202020202020202020202020202020202020202020202",
                        "state_root": "0x0303030303030303030303030303030303030303030303030303030303030303",
                        "body_root": "0x0404040404040404040404040404040404040404040404040404040404040404",
                    },
                    "signature": format!("0x{}", "00".repeat(96)),
                },
            },
        });

        let response = serde_json::from_value::<HeaderResponse>(json)?;

        assert_eq!(response.data.root, H256::repeat_byte(1));
        assert!(response.data.canonical);
        assert_eq!(response.data.header.message.slot, 1000);
        assert_eq!(response.data.header.message.parent_root, H256::repeat_byte(2));

        Ok(())
    }

    #[test]
    fn empty_blob_sidecars_response() -> Result<()> {
        let response = serde_json::from_value::<BlobSidecarsResponse>(json!({ "data": [] }))?;

        assert!(response.data.is_empty());

        Ok(())
    }
}
