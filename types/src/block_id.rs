use core::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use parse_display::{Display, FromStr};
use thiserror::Error;

use crate::primitives::{H256, Slot};

const ROOT_HEX_LENGTH: usize = 64;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, FromStr)]
#[display(style = "lowercase")]
pub enum BlockTag {
    Head,
    Finalized,
    Genesis,
}

/// Block identifier accepted by the Eth Beacon Node API.
///
/// Tags are resolved against a live beacon node at request time.
/// Slots and roots may be answered from the archive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BlockId {
    Tag(BlockTag),
    Slot(Slot),
    Root(H256),
}

impl Display for BlockId {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        match self {
            Self::Tag(tag) => Display::fmt(tag, formatter),
            Self::Slot(slot) => Display::fmt(slot, formatter),
            Self::Root(root) => write!(formatter, "{root:?}"),
        }
    }
}

impl FromStr for BlockId {
    type Err = ParseBlockIdError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        if let Ok(tag) = string.parse() {
            return Ok(Self::Tag(tag));
        }

        if let Some(digits) = string.strip_prefix("0x") {
            if digits.len() != ROOT_HEX_LENGTH {
                return Err(ParseBlockIdError::RootLength {
                    length: digits.len(),
                });
            }

            return digits
                .parse()
                .map(Self::Root)
                .map_err(|_| ParseBlockIdError::RootDigits);
        }

        if !string.is_empty() && string.bytes().all(|byte| byte.is_ascii_digit()) {
            return string
                .parse()
                .map(Self::Slot)
                .map_err(|_| ParseBlockIdError::SlotOverflow);
        }

        Err(ParseBlockIdError::Unrecognized)
    }
}

impl From<BlockTag> for BlockId {
    fn from(tag: BlockTag) -> Self {
        Self::Tag(tag)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum ParseBlockIdError {
    #[error("block root must have {ROOT_HEX_LENGTH} hexadecimal digits (found {length})")]
    RootLength { length: usize },
    #[error("block root contains characters that are not hexadecimal digits")]
    RootDigits,
    #[error("slot does not fit in 64 bits")]
    SlotOverflow,
    #[error("expected head, finalized, genesis, a slot or a 0x-prefixed block root")]
    Unrecognized,
}
