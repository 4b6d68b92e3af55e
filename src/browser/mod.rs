//! Browser automation module
//!
//! This module connects the capture core to a real browser through
//! ChromiumOxide: lifecycle management, navigation, the in-page agent, input
//! events and the results tab.

pub mod agent;
pub mod controller;
pub mod interactions;
pub mod navigation;
pub mod results;
pub mod scripts;

pub use agent::CdpAgent;
pub use controller::{BrowserConfig, BrowserConfigBuilder, BrowserController, PageHandle};
pub use interactions::CdpInteractions;
pub use navigation::{NavigationOptions, NavigationResult, PageNavigator, UrlValidator, WaitUntil};
pub use results::CdpResultsView;
