//! # bank0 – Guardian
//!
//! Everything that reacts to a push notification:
//!
//! - **Notification** – the parsed push payload
//! - **Guardian boundary** – allow / reject / delete-enrollment trait
//! - **Consent** – PS256-signed client for the tenant's consent records
//! - **Flows** – mismatch check and login / payment approval sequencing

pub mod api;
pub mod consent;
pub mod flows;
pub mod notification;

pub use api::GuardianApi;
pub use consent::{ConsentApi, ConsentClient, ConsentEntity, PaymentDetails};
pub use flows::{AuthorizationRequest, LoginRequest, PaymentRequest};
pub use notification::Notification;
