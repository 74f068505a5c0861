use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use rand::Rng;

const USER_AGENTS: [&str; 8] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Picks desktop user agents, either rotating at random or pinned to the first.
#[derive(Debug, Clone)]
pub struct UserAgentGenerator {
    randomize: bool,
}

impl UserAgentGenerator {
    pub fn new(randomize: bool) -> Self {
        Self { randomize }
    }

    pub fn user_agent(&self) -> &'static str {
        if !self.randomize {
            return USER_AGENTS[0];
        }
        let mut rng = rand::thread_rng();
        USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
    }

    pub fn all() -> &'static [&'static str] {
        &USER_AGENTS
    }
}

/// Hides the usual headless markers from simple bot checks. Registered with
/// [`stealth_init_params`] so it runs before any script of the page.
pub fn generate_stealth_script() -> &'static str {
    r#"
    (function() {
        Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
        Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
        Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
        window.chrome = window.chrome || { runtime: {} };
    })();
    "#
}

/// CDP command that installs the stealth script on every new document.
pub fn stealth_init_params() -> AddScriptToEvaluateOnNewDocumentParams {
    AddScriptToEvaluateOnNewDocumentParams::new(generate_stealth_script())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_generation() {
        let generator = UserAgentGenerator::new(true);
        let user_agent = generator.user_agent();

        assert!(user_agent.contains("Mozilla"), "User agent should contain Mozilla");
        assert!(UserAgentGenerator::all().contains(&user_agent));
    }

    #[test]
    fn test_pinned_user_agent() {
        let generator = UserAgentGenerator::new(false);
        assert_eq!(generator.user_agent(), generator.user_agent());
        assert!(generator.user_agent().contains("Chrome/120"));
    }

    #[test]
    fn test_stealth_script_generation() {
        let script = generate_stealth_script();

        assert!(script.contains("navigator"), "Script should modify navigator properties");
        assert!(script.contains("webdriver"), "Script should hide webdriver property");
    }

    #[test]
    fn test_stealth_script_installed_for_new_documents() {
        let params = stealth_init_params();
        assert_eq!(params.source, generate_stealth_script());
        assert!(params.source.contains("webdriver"));
    }
}
