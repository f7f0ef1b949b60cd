//! Host GL version parsing.

/// Parsed `GL_VERSION` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlVersion {
    pub is_gles: bool,
    pub major: u32,
    pub minor: u32,
}

impl GlVersion {
    pub const fn desktop(major: u32, minor: u32) -> Self {
        Self {
            is_gles: false,
            major,
            minor,
        }
    }

    pub const fn gles(major: u32, minor: u32) -> Self {
        Self {
            is_gles: true,
            major,
            minor,
        }
    }

    /// Parse strings such as `"4.5.0 NVIDIA 535.54"` or
    /// `"OpenGL ES 3.2 Mesa 23.1"`.
    pub fn parse(version: &str) -> Option<Self> {
        let trimmed = version.trim();
        let (is_gles, rest) = match trimmed.strip_prefix("OpenGL ES") {
            Some(rest) => (true, rest.trim_start_matches(['-', ' ']).trim_start_matches("CM ")),
            None => (false, trimmed),
        };
        let number = rest.split_whitespace().next()?;
        let mut parts = number.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts
            .next()
            .map(|m| m.chars().take_while(char::is_ascii_digit).collect::<String>())
            .and_then(|m| m.parse().ok())
            .unwrap_or(0);
        Some(Self {
            is_gles,
            major,
            minor,
        })
    }

    /// `major * 10 + minor`, e.g. 45 for 4.5.
    pub fn number(&self) -> u32 {
        self.major * 10 + self.minor
    }

    /// GLSL level advertised to the guest for this host.
    pub fn glsl_level(&self) -> u32 {
        let ver = self.number();
        if self.is_gles {
            return match ver {
                31.. => 310,
                30 => 130,
                _ => 120,
            };
        }
        match ver {
            43.. => 430,
            42 => 420,
            41 => 410,
            40 => 400,
            33 => 330,
            32 => 150,
            31 => 140,
            _ => 130,
        }
    }
}

/// Context versions tried in order when creating the renderer context.
pub const CONTEXT_VERSIONS: &[(u32, u32)] = &[
    (4, 6),
    (4, 5),
    (4, 4),
    (4, 3),
    (4, 2),
    (4, 1),
    (4, 0),
    (3, 3),
    (3, 2),
    (3, 1),
    (3, 0),
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn desktop_strings() {
        assert_eq!(GlVersion::parse("4.5.0 NVIDIA 535.54"), Some(GlVersion::desktop(4, 5)));
        assert_eq!(GlVersion::parse("3.3 (Core Profile) Mesa 23.1.0"), Some(GlVersion::desktop(3, 3)));
        assert_eq!(GlVersion::parse("garbage"), None);
    }

    #[test]
    fn gles_strings() {
        assert_eq!(GlVersion::parse("OpenGL ES 3.2 Mesa 23.1"), Some(GlVersion::gles(3, 2)));
        assert_eq!(GlVersion::parse("OpenGL ES 3.0"), Some(GlVersion::gles(3, 0)));
    }

    #[test]
    fn glsl_levels() {
        assert_eq!(GlVersion::desktop(4, 6).glsl_level(), 430);
        assert_eq!(GlVersion::desktop(3, 2).glsl_level(), 150);
        assert_eq!(GlVersion::desktop(3, 0).glsl_level(), 130);
        assert_eq!(GlVersion::gles(3, 2).glsl_level(), 310);
        assert_eq!(GlVersion::gles(3, 0).glsl_level(), 130);
        assert_eq!(GlVersion::gles(2, 0).glsl_level(), 120);
    }
}
