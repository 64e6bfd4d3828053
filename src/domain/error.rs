//! Ledger error types.

/// Top-level error type for quantledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid order for {code}: {reason}")]
    InvalidOrder { code: String, reason: String },

    #[error("insufficient funds: need {required:.2}, available {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("insufficient position in {code}: requested {requested}, sellable {sellable}")]
    InsufficientPosition {
        code: String,
        requested: i64,
        sellable: i64,
    },

    #[error("unknown order {order_id}")]
    UnknownOrder { order_id: String },

    #[error("order {order_id} is not fillable ({status})")]
    OrderNotFillable { order_id: String, status: String },

    #[error("order {order_id} is not cancellable ({status})")]
    OrderNotCancellable { order_id: String, status: String },

    #[error("ambiguous position lookup: {count} positions held, expected exactly one")]
    AmbiguousPosition { count: usize },

    #[error("config template written to {path}: fill in credentials and re-run")]
    ConfigCreated { path: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("warehouse error: {reason}")]
    Database { reason: String },

    #[error("warehouse query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("no data for {code} at {frequency}")]
    NoData { code: String, frequency: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&LedgerError> for std::process::ExitCode {
    fn from(err: &LedgerError) -> Self {
        let code: u8 = match err {
            LedgerError::Io(_) => 1,
            LedgerError::ConfigCreated { .. }
            | LedgerError::ConfigParse { .. }
            | LedgerError::ConfigMissing { .. }
            | LedgerError::ConfigInvalid { .. } => 2,
            LedgerError::Database { .. } | LedgerError::DatabaseQuery { .. } => 3,
            LedgerError::InvalidOrder { .. }
            | LedgerError::InsufficientFunds { .. }
            | LedgerError::InsufficientPosition { .. }
            | LedgerError::UnknownOrder { .. }
            | LedgerError::OrderNotFillable { .. }
            | LedgerError::OrderNotCancellable { .. }
            | LedgerError::AmbiguousPosition { .. } => 4,
            LedgerError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
