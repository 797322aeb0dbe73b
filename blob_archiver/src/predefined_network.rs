use clap::ValueEnum;
use strum::Display;
use types::primitives::UnixSeconds;

#[derive(Clone, Copy, Default, Display, ValueEnum)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(test, derive(PartialEq, Eq, Debug))]
pub enum PredefinedNetwork {
    #[default]
    Mainnet,
    Sepolia,
    Holesky,
}

impl PredefinedNetwork {
    #[must_use]
    pub const fn genesis_time(self) -> UnixSeconds {
        match self {
            Self::Mainnet => 1_606_824_023,
            Self::Sepolia => 1_655_733_600,
            Self::Holesky => 1_695_902_400,
        }
    }
}
