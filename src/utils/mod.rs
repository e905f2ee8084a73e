pub mod http;
pub mod logger;
pub mod validator;
