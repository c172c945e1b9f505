//! Request identity: user agent and language headers, rotated on a cadence.

/// Header set presented before the first rotation.
pub const DEFAULT_PROFILE: HeaderProfile = HeaderProfile {
    user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36",
    accept_language: "en,de;q=0.8",
};

/// Browser identities cycled through on rotation.
pub const ROTATION_PROFILES: &[HeaderProfile] = &[
    // Chrome on Windows
    HeaderProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
        accept_language: "en-US,en;q=0.9",
    },
    // Safari on Mac
    HeaderProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Safari/605.1.15",
        accept_language: "en-US,en;q=0.8",
    },
    // Chrome on Linux
    HeaderProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0 Safari/537.36",
        accept_language: "en-US,en;q=0.9,de;q=0.8",
    },
    // Safari on iPhone
    HeaderProfile {
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1",
        accept_language: "en-US,en;q=0.7",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderProfile {
    pub user_agent: &'static str,
    pub accept_language: &'static str,
}

/// What a request tick rotated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rotation {
    pub headers: bool,
    pub proxy: bool,
}

/// Request counter driving header and proxy rotation.
///
/// Headers rotate every `every` requests, the proxy every
/// `every * proxy_multiplier` requests. `every == 0` disables both.
#[derive(Debug, Clone)]
pub struct IdentityRotation {
    every: u64,
    proxy_multiplier: u64,
    count: u64,
    /// Index into [`ROTATION_PROFILES`]; `None` until the first rotation.
    profile: Option<usize>,
    fixed_user_agent: Option<String>,
}

impl IdentityRotation {
    pub fn new(every: u64, proxy_multiplier: u64, fixed_user_agent: Option<String>) -> Self {
        Self {
            every,
            proxy_multiplier,
            count: 0,
            profile: None,
            fixed_user_agent,
        }
    }

    /// Count one request and rotate whatever is due.
    pub fn tick(&mut self) -> Rotation {
        self.count += 1;
        if self.every == 0 {
            return Rotation::default();
        }

        let headers = self.count % self.every == 0;
        if headers {
            self.profile = Some(self.profile.map_or(0, |i| (i + 1) % ROTATION_PROFILES.len()));
        }
        let proxy_every = self.every.saturating_mul(self.proxy_multiplier);
        let proxy = proxy_every > 0 && self.count % proxy_every == 0;

        Rotation { headers, proxy }
    }

    pub fn request_count(&self) -> u64 {
        self.count
    }

    pub fn profile(&self) -> HeaderProfile {
        self.profile
            .map(|i| ROTATION_PROFILES[i])
            .unwrap_or(DEFAULT_PROFILE)
    }

    /// Identity headers for the next request. A fixed user agent overrides the profile's.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let profile = self.profile();
        let user_agent = self
            .fixed_user_agent
            .clone()
            .unwrap_or_else(|| profile.user_agent.to_string());
        vec![
            ("User-Agent", user_agent),
            ("Accept-Language", profile.accept_language.to_string()),
            ("Connection", "keep-alive".to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_cadence() {
        let mut rotation = IdentityRotation::new(20, 3, None);
        let mut header_rotations = Vec::new();
        let mut proxy_rotations = Vec::new();
        for _ in 0..120 {
            let r = rotation.tick();
            if r.headers {
                header_rotations.push(rotation.request_count());
            }
            if r.proxy {
                proxy_rotations.push(rotation.request_count());
            }
        }
        assert_eq!(header_rotations, vec![20, 40, 60, 80, 100, 120]);
        assert_eq!(proxy_rotations, vec![60, 120]);
    }

    #[test]
    fn test_profiles_cycle_after_default() {
        let mut rotation = IdentityRotation::new(1, 3, None);
        assert_eq!(rotation.profile(), DEFAULT_PROFILE);
        for i in 0..ROTATION_PROFILES.len() + 1 {
            rotation.tick();
            assert_eq!(rotation.profile(), ROTATION_PROFILES[i % ROTATION_PROFILES.len()]);
        }
    }

    #[test]
    fn test_fixed_user_agent_keeps_language_rotation() {
        let mut rotation = IdentityRotation::new(1, 3, Some("MyBot/1.0".to_string()));
        rotation.tick();
        let headers = rotation.headers();
        assert_eq!(headers[0], ("User-Agent", "MyBot/1.0".to_string()));
        assert_eq!(
            headers[1],
            ("Accept-Language", ROTATION_PROFILES[0].accept_language.to_string())
        );
    }

    #[test]
    fn test_zero_disables_rotation() {
        let mut rotation = IdentityRotation::new(0, 3, None);
        for _ in 0..100 {
            assert_eq!(rotation.tick(), Rotation::default());
        }
        assert_eq!(rotation.profile(), DEFAULT_PROFILE);
    }
}
