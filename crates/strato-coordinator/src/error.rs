pub type Result<T> = std::result::Result<T, strato_types::StratoError>;
