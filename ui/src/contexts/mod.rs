mod api;

pub use api::{ApiProvider, ApiProviderProps, use_api_context};
