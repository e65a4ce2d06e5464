pub mod address;
pub mod app_config;
pub mod config;
pub mod normalize;
pub mod records;

use thiserror::Error;

pub use address::{normalize_address_abbreviations, parse_address, ParsedAddress};
pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use normalize::{
    classify_dealer_type, dedupe_raw_records, determine_country, extract_car_brands,
    normalize_records, standardize_record, validate_record, NormalizedBatch, RejectionReason,
};
pub use records::{CanonicalDealerRecord, DealershipType, RawDealerRecord};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
