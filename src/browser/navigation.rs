//! Page navigation functionality
//!
//! URL navigation with retry logic and timeout handling. A navigation ends
//! whatever UI the page was showing, so callers invalidate the page session
//! afterwards.

use crate::browser::PageHandle;
use crate::error::{Error, NavigationError, Result};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Maximum accepted URL length
pub const MAX_URL_LEN: usize = 2048;

/// Options for page navigation
#[derive(Debug, Clone)]
pub struct NavigationOptions {
    /// Timeout in milliseconds (default: 30000)
    pub timeout_ms: u64,
    /// Wait until condition (default: load)
    pub wait_until: WaitUntil,
    /// Number of retry attempts (default: 2)
    pub retries: u32,
    /// Delay between retries in ms (default: 1000)
    pub retry_delay_ms: u64,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            wait_until: WaitUntil::Load,
            retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

impl NavigationOptions {
    /// Default options with a different timeout
    pub fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            ..Self::default()
        }
    }
}

/// Condition to wait for after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// Wait until load event fires
    Load,
    /// Wait until DOMContentLoaded event fires
    DomContentLoaded,
    /// Wait for the load event plus a short quiet period
    NetworkIdle,
}

/// Result of a navigation operation
#[derive(Debug)]
pub struct NavigationResult {
    /// Final URL after any redirects
    pub final_url: String,
    /// Page title
    pub title: Option<String>,
    /// Navigation duration in milliseconds
    pub duration_ms: u64,
}

/// URL validation utilities
pub struct UrlValidator;

impl UrlValidator {
    /// Parse and validate a URL for navigation
    pub fn validate(url: &str) -> std::result::Result<Url, String> {
        // Check for empty URL
        if url.is_empty() {
            return Err("URL cannot be empty".to_string());
        }

        // Check URL length (max 2048 characters is common limit)
        if url.len() > MAX_URL_LEN {
            return Err(format!(
                "URL exceeds maximum length of {} characters",
                MAX_URL_LEN
            ));
        }

        // Check for valid protocol
        let parsed = Url::parse(url).map_err(|e| format!("Invalid URL {}: {}", url, e))?;
        match parsed.scheme() {
            "http" | "https" | "file" => Ok(parsed),
            other => Err(format!(
                "URL must use http, https, or file, not {}: {}",
                other, url
            )),
        }
    }

    /// Check if URL points to localhost
    pub fn is_localhost(url: &Url) -> bool {
        matches!(
            url.host_str(),
            Some("localhost" | "127.0.0.1" | "[::1]" | "0.0.0.0")
        )
    }
}

/// Page navigator with retry and readiness handling
pub struct PageNavigator;

impl PageNavigator {
    /// Navigate to a URL, retrying on failure
    #[instrument(skip(page, options))]
    pub async fn goto(
        page: &PageHandle,
        url: &str,
        options: Option<NavigationOptions>,
    ) -> Result<NavigationResult> {
        let opts = options.unwrap_or_default();
        let start = std::time::Instant::now();

        // Validate URL
        let parsed = UrlValidator::validate(url).map_err(NavigationError::InvalidUrl)?;
        if UrlValidator::is_localhost(&parsed) {
            debug!("Navigating to a local address");
        }

        info!("Navigating to: {}", url);

        let mut last_error = None;
        for attempt in 0..=opts.retries {
            if attempt > 0 {
                warn!("Navigation retry attempt {} of {}", attempt, opts.retries);
                tokio::time::sleep(Duration::from_millis(opts.retry_delay_ms)).await;
            }

            match Self::navigate_once(&page.page, parsed.as_str(), &opts).await {
                Ok(mut result) => {
                    // Update page URL
                    page.set_url(result.final_url.clone()).await;
                    result.duration_ms = start.elapsed().as_millis() as u64;
                    return Ok(result);
                }
                Err(e) => {
                    warn!("Navigation attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            NavigationError::LoadFailed("Navigation failed after all retries".to_string()).into()
        }))
    }

    async fn navigate_once(
        page: &chromiumoxide::Page,
        url: &str,
        opts: &NavigationOptions,
    ) -> Result<NavigationResult> {
        let timeout = Duration::from_millis(opts.timeout_ms);

        // Navigate with timeout
        tokio::time::timeout(timeout, page.goto(url))
            .await
            .map_err(|_| NavigationError::Timeout(opts.timeout_ms))?
            .map_err(|e| NavigationError::LoadFailed(e.to_string()))?;

        // Wait for page to be ready based on wait_until option
        Self::wait_for_ready(page, opts).await?;

        // Get final URL and title
        let final_url = page
            .url()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?
            .unwrap_or_else(|| url.to_string());

        let title = page
            .evaluate("document.title")
            .await
            .ok()
            .and_then(|v| v.into_value::<String>().ok());

        debug!("Navigation complete: {} -> {}", url, final_url);

        Ok(NavigationResult {
            final_url,
            title,
            duration_ms: 0,
        })
    }

    async fn wait_for_ready(page: &chromiumoxide::Page, opts: &NavigationOptions) -> Result<()> {
        let script = match opts.wait_until {
            WaitUntil::Load => {
                r#"
                    new Promise(resolve => {
                        if (document.readyState === 'complete') {
                            resolve(true);
                        } else {
                            window.addEventListener('load', () => resolve(true));
                        }
                    })
                "#
            }
            WaitUntil::DomContentLoaded => {
                r#"
                    new Promise(resolve => {
                        if (document.readyState !== 'loading') {
                            resolve(true);
                        } else {
                            document.addEventListener('DOMContentLoaded', () => resolve(true));
                        }
                    })
                "#
            }
            // No network monitoring; settle for a short quiet period after load
            WaitUntil::NetworkIdle => {
                r#"
                    new Promise(resolve => {
                        const settle = () => setTimeout(() => resolve(true), 500);
                        if (document.readyState === 'complete') {
                            settle();
                        } else {
                            window.addEventListener('load', settle);
                        }
                    })
                "#
            }
        };

        let timeout = Duration::from_millis(opts.timeout_ms);
        tokio::time::timeout(timeout, page.evaluate(script))
            .await
            .map_err(|_| NavigationError::Timeout(opts.timeout_ms))?
            .map_err(|e| Error::cdp(e.to_string()))?;

        Ok(())
    }

    /// Reload the current page
    #[instrument(skip(page))]
    pub async fn reload(page: &PageHandle) -> Result<()> {
        page.page
            .reload()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // NavigationOptions Tests
    // ========================================================================

    #[test]
    fn test_navigation_options_default() {
        let opts = NavigationOptions::default();
        assert_eq!(opts.timeout_ms, 30000);
        assert_eq!(opts.retries, 2);
        assert_eq!(opts.wait_until, WaitUntil::Load);
        assert_eq!(NavigationOptions::with_timeout(5000).timeout_ms, 5000);
    }

    // ========================================================================
    // URL Validation Tests
    // ========================================================================

    #[test]
    fn test_url_validation_accepts_supported_schemes() {
        assert!(UrlValidator::validate("http://example.com").is_ok());
        assert!(UrlValidator::validate("https://example.com/a?b=c").is_ok());
        assert!(UrlValidator::validate("file:///path/to/file.html").is_ok());
    }

    #[test]
    fn test_url_validation_empty() {
        let result = UrlValidator::validate("");
        assert!(result.unwrap_err().contains("empty"));
    }

    #[test]
    fn test_url_validation_no_scheme() {
        assert!(UrlValidator::validate("example.com").is_err());
    }

    #[test]
    fn test_url_validation_invalid_scheme() {
        let result = UrlValidator::validate("ftp://example.com");
        assert!(result.unwrap_err().contains("ftp"));
    }

    #[test]
    fn test_url_validation_too_long() {
        let long_url = format!("https://example.com/{}", "a".repeat(3000));
        let result = UrlValidator::validate(&long_url);
        assert!(result.unwrap_err().contains("maximum length"));
    }

    // ========================================================================
    // Localhost Check Tests
    // ========================================================================

    #[test]
    fn test_localhost_detection() {
        let local = UrlValidator::validate("http://localhost:8080/page").unwrap();
        let remote = UrlValidator::validate("https://example.com").unwrap();
        assert!(UrlValidator::is_localhost(&local));
        assert!(!UrlValidator::is_localhost(&remote));
    }
}
