pub mod client_factory;
pub mod service_client;

pub use client_factory::ServiceClientFactory;
pub use service_client::{
    ApiBody, ApiMethod, ApiRequest, ApiTransport, ServiceClient, ServiceEndpoints, ServiceError,
    ServiceFamily,
};
