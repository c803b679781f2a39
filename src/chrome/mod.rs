pub mod browser;
pub mod interceptor;

pub use browser::{BrowserManager, find_chrome_executable};
pub use interceptor::CdpHost;
