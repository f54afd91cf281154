// The core module holds everything that doesn't care how bytes reach Google
// or how requests reach us: credential lifecycle, service client handles and
// the tool machinery (schemas, registry, dispatcher).

#[path = "credentials/mod.rs"]
pub mod credentials;

#[path = "services/mod.rs"]
pub mod services;

#[path = "tools/mod.rs"]
pub mod tools;
