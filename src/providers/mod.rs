pub mod awesome_api;

pub use awesome_api::AwesomeApiClient;
