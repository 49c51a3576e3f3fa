//! LIKE-search options
//!
//! A variable comment may carry options after a colon, e.g.
//! `/*pmb.memberName:likePrefix*/'S'` or `/*#current:notLike*/'x'`.

use std::fmt;

/// Where the wildcard goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeSearchOption {
    /// `value%`
    Prefix,
    /// `%value`
    Suffix,
    /// `%value%`
    Contain,
}

impl LikeSearchOption {
    /// Escape wildcards in `value` and affix `%` according to the option
    pub fn apply(&self, value: &str, escape: char) -> String {
        let escaped = escape_wildcards(value, escape);
        match self {
            LikeSearchOption::Prefix => format!("{escaped}%"),
            LikeSearchOption::Suffix => format!("%{escaped}"),
            LikeSearchOption::Contain => format!("%{escaped}%"),
        }
    }

    /// SQL appended after the placeholder so the escape character takes effect
    pub fn rear_option(escape: char) -> String {
        format!(" escape '{escape}'")
    }

    fn keyword(&self) -> &'static str {
        match self {
            LikeSearchOption::Prefix => "likePrefix",
            LikeSearchOption::Suffix => "likeSuffix",
            LikeSearchOption::Contain => "likeContain",
        }
    }
}

impl fmt::Display for LikeSearchOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

fn escape_wildcards(value: &str, escape: char) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == escape || ch == '%' || ch == '_' {
            escaped.push(escape);
        }
        escaped.push(ch);
    }
    escaped
}

/// Options written after `:` in a variable or FOR comment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariableOptions {
    /// Explicit LIKE-search option
    pub like: Option<LikeSearchOption>,
    /// Suppress the LIKE-search option inherited from the enclosing loop
    pub not_like: bool,
}

impl VariableOptions {
    /// Split `path:opt1|opt2` into the path and its options.
    ///
    /// Errors carry a human-readable reason.
    pub fn split(expression: &str) -> Result<(&str, VariableOptions), String> {
        let Some((path, options)) = expression.split_once(':') else {
            return Ok((expression.trim(), VariableOptions::default()));
        };

        let mut parsed = VariableOptions::default();
        for option in options.split('|').map(str::trim) {
            let like = match option {
                "likePrefix" => LikeSearchOption::Prefix,
                "likeSuffix" => LikeSearchOption::Suffix,
                "likeContain" => LikeSearchOption::Contain,
                "notLike" => {
                    parsed.not_like = true;
                    continue;
                }
                other => return Err(format!("unknown option '{other}' in '{expression}'")),
            };
            if let Some(existing) = parsed.like {
                return Err(format!(
                    "options '{existing}' and '{like}' cannot be combined in '{expression}'"
                ));
            }
            parsed.like = Some(like);
        }

        if parsed.not_like && parsed.like.is_some() {
            return Err(format!(
                "'notLike' cannot be combined with a like option in '{expression}'"
            ));
        }
        Ok((path.trim(), parsed))
    }

    /// The option that applies, given the one inherited from an enclosing loop
    pub fn effective(&self, inherited: Option<LikeSearchOption>) -> Option<LikeSearchOption> {
        if self.not_like {
            None
        } else {
            self.like.or(inherited)
        }
    }
}
