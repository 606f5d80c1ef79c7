pub mod traits;
pub mod webdriver;

pub use traits::{DriverFactory, RemoteDriver, SessionDescriptor};
pub use webdriver::{WebDriverFactory, WebDriverSession};
