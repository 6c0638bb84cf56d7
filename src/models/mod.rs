// Models module

pub mod notification;
pub mod service;
pub mod session;
pub mod theme;

pub use notification::Notification;
pub use service::{
    CreateServiceRequest, CreateServiceResponse, NewService, ServiceDB, ServiceValidationError,
    TimeWindow, UpcomingServiceResponse,
};
pub use session::{
    Credentials, CredentialsRequest, CurrentSession, IdentityTokenResponse, Session,
    SessionResponse,
};
pub use theme::{ColorScheme, Theme};
