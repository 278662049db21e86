pub mod callback;
pub mod flow;
pub mod lifecycle;
pub mod store;
pub mod token;

pub use callback::listen_for_callback;
pub use flow::{authorization_url, complete_authorization, run_authorization_flow};
pub use lifecycle::{is_token_valid, TokenManager, TokenState, REFRESH_MARGIN_SECS};
pub use store::{TokenRecord, TokenStore};
pub use token::{exchange_code, refresh_access_token, ClientCredentials, TokenResponse};
