//! Bouquet option string parsing.
//!
//! Format: `OPTION=VALUE,VALUE,...;OPTION=VALUE,...`. Every directive is
//! checked against its argument bounds when parsed, and the list is then
//! ordered by priority, highest first. Directives of equal priority keep
//! their textual order.

use std::str::FromStr;

use glob::Pattern;

use crate::error::ConfigError;

pub const HELP: &str = "\
Options for organizing and fixing channel groups (aka bouquets).
Format: OPTION=VALUE,VALUE,...;OPTION=VALUE,VALUE,...;...

Each option can be used more than once. Patterns used for name matching are
shell path patterns.

merge=TARGET,PATTERN,PATTERN,...
    Merge channel groups matching PATTERN into a new group TARGET.

remove=PATTERN,PATTERN,...
ignore=PATTERN,PATTERN,...
    Remove channel groups matching PATTERN. With 'ignore' channels which
    belong to no other group end up in the '==UNSORTED==' group; with
    'remove' the group is dropped right before output.

rename=OLD,NEW
    Rename a channel group OLD to NEW.

add=GROUP,PATTERN,PATTERN,...
    Add channels matching PATTERN to GROUP. If this group doesn't exist
    a new group is created.

move=GROUP,PATTERN,PATTERN,...
    Same as 'add' but remove matching channels from their original groups.

s=SUBSTRING,REPLACEMENT
    Replace all occurrences of SUBSTRING in channel names. No patterns here.

lang=LANG,...
    Set languages for multilingual bouquet names. LANG is a three character
    language code as defined by ISO 639-2, e.g. lang=deu,ger.
";

/// When a directive runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Before any table has been received.
    PreScan,
    /// After the scan, before services are mapped to bouquets.
    PostScan,
    /// After mapping, right before the list is sorted and written.
    PreOutput,
}

struct DirectiveParams {
    name: &'static str,
    min_args: usize,
    max_args: Option<usize>,
    priority: u8,
    stage: Stage,
}

const DIRECTIVES: [DirectiveParams; 8] = [
    DirectiveParams { name: "lang", min_args: 1, max_args: None, priority: 10, stage: Stage::PreScan },
    DirectiveParams { name: "merge", min_args: 2, max_args: None, priority: 10, stage: Stage::PostScan },
    DirectiveParams { name: "rename", min_args: 2, max_args: Some(2), priority: 10, stage: Stage::PostScan },
    DirectiveParams { name: "add", min_args: 2, max_args: None, priority: 20, stage: Stage::PostScan },
    DirectiveParams { name: "move", min_args: 2, max_args: None, priority: 20, stage: Stage::PostScan },
    DirectiveParams { name: "s", min_args: 2, max_args: Some(2), priority: 30, stage: Stage::PostScan },
    DirectiveParams { name: "ignore", min_args: 1, max_args: None, priority: 10, stage: Stage::PostScan },
    DirectiveParams { name: "remove", min_args: 1, max_args: None, priority: 10, stage: Stage::PreOutput },
];

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Lang(Vec<Pattern>),
    Merge {
        target: String,
        patterns: Vec<Pattern>,
    },
    Rename {
        old: String,
        new: String,
    },
    /// `add`, or `move` when `exclusive`.
    Add {
        group: String,
        patterns: Vec<Pattern>,
        exclusive: bool,
    },
    Substitute {
        from: String,
        to: String,
    },
    Ignore(Vec<Pattern>),
    Remove(Vec<Pattern>),
}

fn compile(patterns: &[&str]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(|_| ConfigError::BouquetPattern(p.to_string())))
        .collect()
}

impl Directive {
    fn params(&self) -> &'static DirectiveParams {
        let index = match self {
            Directive::Lang(_) => 0,
            Directive::Merge { .. } => 1,
            Directive::Rename { .. } => 2,
            Directive::Add { exclusive: false, .. } => 3,
            Directive::Add { exclusive: true, .. } => 4,
            Directive::Substitute { .. } => 5,
            Directive::Ignore(_) => 6,
            Directive::Remove(_) => 7,
        };
        &DIRECTIVES[index]
    }

    pub fn name(&self) -> &'static str {
        self.params().name
    }

    pub fn priority(&self) -> u8 {
        self.params().priority
    }

    pub fn stage(&self) -> Stage {
        self.params().stage
    }

    /// Build a directive from its name and arguments.
    fn build(name: &str, args: &[&str]) -> Result<Self, ConfigError> {
        let params = DIRECTIVES
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ConfigError::UnknownBouquetOption(name.to_string()))?;
        if args.len() < params.min_args || params.max_args.map_or(false, |max| args.len() > max)
        {
            return Err(ConfigError::BouquetArity(name.to_string()));
        }

        let directive = match name {
            "lang" => Directive::Lang(compile(args)?),
            "merge" => Directive::Merge {
                target: args[0].to_string(),
                patterns: compile(&args[1..])?,
            },
            "rename" => Directive::Rename {
                old: args[0].to_string(),
                new: args[1].to_string(),
            },
            "add" | "move" => Directive::Add {
                group: args[0].to_string(),
                patterns: compile(&args[1..])?,
                exclusive: name == "move",
            },
            "s" => Directive::Substitute {
                from: args[0].to_string(),
                to: args[1].to_string(),
            },
            "ignore" => Directive::Ignore(compile(args)?),
            _ => Directive::Remove(compile(args)?),
        };
        Ok(directive)
    }
}

/// A parsed and priority-ordered bouquet option string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BouquetOptions {
    directives: Vec<Directive>,
}

impl BouquetOptions {
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Directives of one stage, in execution order.
    pub fn stage(&self, stage: Stage) -> impl Iterator<Item = &Directive> {
        self.directives.iter().filter(move |d| d.stage() == stage)
    }
}

impl FromStr for BouquetOptions {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut directives = Vec::new();
        for token in s.split(';').filter(|t| !t.is_empty()) {
            let (name, values) = token.split_once('=').unwrap_or((token, ""));
            let args: Vec<&str> = values.split(',').filter(|a| !a.is_empty()).collect();
            directives.push(Directive::build(name, &args)?);
        }
        // sort_by is stable
        directives.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Ok(BouquetOptions { directives })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_priority_order() {
        let opts: BouquetOptions = "ignore=Test*;s=HD,SD;add=News,*News*;rename=A,B;move=Kids,*Junior*"
            .parse()
            .unwrap();
        let names: Vec<&str> = opts.directives().iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["s", "add", "move", "ignore", "rename"]);
    }

    #[test]
    fn test_parse_arity() {
        let err = "rename=OnlyOne".parse::<BouquetOptions>().unwrap_err();
        assert!(matches!(err, ConfigError::BouquetArity(ref name) if name == "rename"));

        let err = "s=a,b,c".parse::<BouquetOptions>().unwrap_err();
        assert!(matches!(err, ConfigError::BouquetArity(_)));

        // no '=' at all leaves the directive without arguments
        let err = "remove".parse::<BouquetOptions>().unwrap_err();
        assert!(matches!(err, ConfigError::BouquetArity(_)));
    }

    #[test]
    fn test_parse_unknown_option() {
        let err = "add=G,x;sort=name".parse::<BouquetOptions>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid bouquet option: 'sort'");
    }

    #[test]
    fn test_parse_invalid_pattern() {
        let err = "remove=[abc".parse::<BouquetOptions>().unwrap_err();
        assert!(matches!(err, ConfigError::BouquetPattern(_)));
    }

    #[test]
    fn test_parse_stages() {
        let opts: BouquetOptions = "lang=deu,ger;remove=Adult*;ignore=Test*".parse().unwrap();
        assert_eq!(opts.stage(Stage::PreScan).count(), 1);
        assert_eq!(opts.stage(Stage::PostScan).count(), 1);
        assert!(matches!(
            opts.stage(Stage::PreOutput).next(),
            Some(Directive::Remove(p)) if p[0].matches("Adult Channel")
        ));
    }

    #[test]
    fn test_parse_empty_tokens_skipped() {
        let opts: BouquetOptions = ";;add=G,,A*;".parse().unwrap();
        assert_eq!(
            opts.directives(),
            &[Directive::Add {
                group: "G".to_string(),
                patterns: vec![Pattern::new("A*").unwrap()],
                exclusive: false,
            }]
        );
    }
}
