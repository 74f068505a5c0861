use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecifierError {
    #[error("missing package name")]
    EmptyName,

    #[error("invalid package name '{0}'")]
    InvalidName(String),

    #[error("extras list is not closed with ']'")]
    UnclosedExtras,

    #[error("invalid extra '{0}'")]
    InvalidExtra(String),

    #[error("expected a comparison operator at '{0}'")]
    MissingOperator(String),

    #[error("missing or invalid version after '{0}'")]
    InvalidVersion(String),

    #[error("unexpected input '{0}'")]
    UnexpectedInput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    ArbitraryEqual,
    Compatible,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Less,
    Greater,
}

impl ComparisonOp {
    // longest operators first so `>=` is not read as `>`
    const ALL: [(&'static str, ComparisonOp); 8] = [
        ("===", ComparisonOp::ArbitraryEqual),
        ("~=", ComparisonOp::Compatible),
        ("==", ComparisonOp::Equal),
        ("!=", ComparisonOp::NotEqual),
        ("<=", ComparisonOp::LessEqual),
        (">=", ComparisonOp::GreaterEqual),
        ("<", ComparisonOp::Less),
        (">", ComparisonOp::Greater),
    ];

    pub fn as_str(&self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(_, op)| op == self)
            .map(|(s, _)| *s)
            .unwrap_or("==")
    }

    fn parse_prefix(input: &str) -> Option<(ComparisonOp, &str)> {
        Self::ALL
            .iter()
            .find(|(s, _)| input.starts_with(s))
            .map(|(s, op)| (*op, &input[s.len()..]))
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    pub op: ComparisonOp,
    pub version: String,
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.version)
    }
}

/// One package specifier: `name[extra,...]<op><version>,...; marker`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub extras: Vec<String>,
    pub constraints: Vec<VersionConstraint>,
    pub marker: Option<String>,
}

impl Requirement {
    /// Lowercased name with runs of `-`, `_` and `.` collapsed to `-`.
    pub fn normalized_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        let mut in_separator = false;
        for c in self.name.chars() {
            if matches!(c, '-' | '_' | '.') {
                if !in_separator {
                    out.push('-');
                }
                in_separator = true;
            } else {
                out.push(c.to_ascii_lowercase());
                in_separator = false;
            }
        }
        out
    }

    pub fn is_pinned(&self) -> bool {
        self.constraints.len() == 1
            && matches!(self.constraints[0].op, ComparisonOp::Equal | ComparisonOp::ArbitraryEqual)
            && !self.constraints[0].version.contains('*')
    }
}

impl FromStr for Requirement {
    type Err = SpecifierError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (spec, marker) = match line.split_once(';') {
            Some((spec, marker)) => {
                let marker = marker.trim();
                if marker.is_empty() {
                    return Err(SpecifierError::UnexpectedInput(";".to_string()));
                }
                (spec, Some(marker.to_string()))
            }
            None => (line, None),
        };

        let rest = spec.trim_start();
        let name_len = identifier_len(rest);
        if name_len == 0 {
            return Err(match rest.chars().next() {
                None => SpecifierError::EmptyName,
                Some(c) if is_operator_start(c) || c == '[' || c == ',' => SpecifierError::EmptyName,
                Some(_) => SpecifierError::InvalidName(leading_token(rest)),
            });
        }
        let name = &rest[..name_len];
        if !is_valid_identifier(name) {
            return Err(SpecifierError::InvalidName(name.to_string()));
        }
        let mut rest = rest[name_len..].trim_start();

        let mut extras = Vec::new();
        if let Some(after_bracket) = rest.strip_prefix('[') {
            let close = after_bracket.find(']').ok_or(SpecifierError::UnclosedExtras)?;
            for extra in after_bracket[..close].split(',') {
                let extra = extra.trim();
                if !is_valid_identifier(extra) {
                    return Err(SpecifierError::InvalidExtra(extra.to_string()));
                }
                extras.push(extra.to_string());
            }
            rest = after_bracket[close + 1..].trim_start();
        }

        let mut constraints = Vec::new();
        if !rest.is_empty() {
            for part in rest.split(',') {
                constraints.push(parse_constraint(part.trim())?);
            }
        }

        Ok(Self {
            name: name.to_string(),
            extras,
            constraints,
            marker,
        })
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        let constraints: Vec<String> = self.constraints.iter().map(|c| c.to_string()).collect();
        f.write_str(&constraints.join(","))?;
        if let Some(marker) = &self.marker {
            write!(f, "; {}", marker)?;
        }
        Ok(())
    }
}

fn parse_constraint(part: &str) -> Result<VersionConstraint, SpecifierError> {
    if part.is_empty() {
        return Err(SpecifierError::UnexpectedInput(",".to_string()));
    }
    let (op, remainder) = ComparisonOp::parse_prefix(part)
        .ok_or_else(|| SpecifierError::MissingOperator(part.to_string()))?;

    let version = remainder.trim();
    if version.is_empty() {
        return Err(SpecifierError::InvalidVersion(op.to_string()));
    }
    if !version.chars().all(is_version_char) {
        return Err(SpecifierError::InvalidVersion(format!("{}{}", op, version)));
    }

    Ok(VersionConstraint {
        op,
        version: version.to_string(),
    })
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn is_version_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '*' | '+' | '!' | '_' | '-')
}

fn is_operator_start(c: char) -> bool {
    matches!(c, '=' | '~' | '!' | '<' | '>')
}

fn identifier_len(input: &str) -> usize {
    input.find(|c: char| !is_name_char(c)).unwrap_or(input.len())
}

/// Names and extras must start and end with a letter or digit.
fn is_valid_identifier(s: &str) -> bool {
    let first = s.chars().next();
    let last = s.chars().last();
    matches!(first, Some(c) if c.is_ascii_alphanumeric())
        && matches!(last, Some(c) if c.is_ascii_alphanumeric())
        && s.chars().all(is_name_char)
}

fn leading_token(input: &str) -> String {
    input.split_whitespace().next().unwrap_or(input).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_extras_and_constraint() {
        let req: Requirement = "transformers[torch]>=4.36.0".parse().unwrap();
        assert_eq!(req.name, "transformers");
        assert_eq!(req.extras, vec!["torch"]);
        assert_eq!(
            req.constraints,
            vec![VersionConstraint {
                op: ComparisonOp::GreaterEqual,
                version: "4.36.0".to_string()
            }]
        );
        assert!(req.marker.is_none());
    }

    #[test]
    fn test_parse_bare_name() {
        let req: Requirement = "lxml".parse().unwrap();
        assert_eq!(req.name, "lxml");
        assert!(req.extras.is_empty());
        assert!(req.constraints.is_empty());
    }

    #[test]
    fn test_parse_multiple_constraints_and_marker() {
        let req: Requirement = "torch >= 2.1, != 2.1.1, <3 ; python_version >= \"3.9\"".parse().unwrap();
        let ops: Vec<ComparisonOp> = req.constraints.iter().map(|c| c.op).collect();
        assert_eq!(ops, vec![ComparisonOp::GreaterEqual, ComparisonOp::NotEqual, ComparisonOp::Less]);
        assert_eq!(req.marker.as_deref(), Some("python_version >= \"3.9\""));
    }

    #[test]
    fn test_longest_operator_wins() {
        let req: Requirement = "pkg===1.0".parse().unwrap();
        assert_eq!(req.constraints[0].op, ComparisonOp::ArbitraryEqual);

        let req: Requirement = "pkg~=1.4".parse().unwrap();
        assert_eq!(req.constraints[0].op, ComparisonOp::Compatible);
        assert_eq!(req.constraints[0].version, "1.4");
    }

    #[test]
    fn test_wildcard_and_local_versions() {
        let req: Requirement = "numpy==1.26.*".parse().unwrap();
        assert_eq!(req.constraints[0].version, "1.26.*");
        assert!(!req.is_pinned());

        let req: Requirement = "torch==2.1.0+cpu".parse().unwrap();
        assert!(req.is_pinned());
    }

    #[test]
    fn test_rejects_malformed_specifiers() {
        assert_eq!("".parse::<Requirement>().unwrap_err(), SpecifierError::EmptyName);
        assert_eq!(">=1.0".parse::<Requirement>().unwrap_err(), SpecifierError::EmptyName);
        assert_eq!("pkg[extra".parse::<Requirement>().unwrap_err(), SpecifierError::UnclosedExtras);
        assert_eq!(
            "pkg[-bad]".parse::<Requirement>().unwrap_err(),
            SpecifierError::InvalidExtra("-bad".to_string())
        );
        assert_eq!(
            "pkg>=".parse::<Requirement>().unwrap_err(),
            SpecifierError::InvalidVersion(">=".to_string())
        );
        assert_eq!(
            "pkg 1.0".parse::<Requirement>().unwrap_err(),
            SpecifierError::MissingOperator("1.0".to_string())
        );
        assert!(matches!(
            "-pkg>=1".parse::<Requirement>().unwrap_err(),
            SpecifierError::InvalidName(_)
        ));
        assert!(matches!(
            "pkg>=1.0,".parse::<Requirement>().unwrap_err(),
            SpecifierError::UnexpectedInput(_)
        ));

        // empty extras and markers are not valid specifiers
        for line in ["pkg[,]", "pkg[a,,b]", "pkg[]"] {
            assert_eq!(
                line.parse::<Requirement>().unwrap_err(),
                SpecifierError::InvalidExtra(String::new()),
                "{}",
                line
            );
        }
        for line in ["pkg;", "pkg>=1.0 ;  "] {
            assert_eq!(
                line.parse::<Requirement>().unwrap_err(),
                SpecifierError::UnexpectedInput(";".to_string()),
                "{}",
                line
            );
        }
    }

    #[test]
    fn test_normalized_name() {
        let req: Requirement = "Beautiful__Soup.4".parse().unwrap();
        assert_eq!(req.normalized_name(), "beautiful-soup-4");
    }

    #[test]
    fn test_display_is_canonical() {
        let req: Requirement = "httpx [http2, socks] >=0.25 ,<1.0;sys_platform=='linux'".parse().unwrap();
        assert_eq!(req.to_string(), "httpx[http2,socks]>=0.25,<1.0; sys_platform=='linux'");
    }
}
