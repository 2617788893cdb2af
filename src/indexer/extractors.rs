//! Role-specific pattern recognizers.
//!
//! Each extractor scans raw file text with precompiled regexes and never
//! fails: text that matches none of the recognized shapes yields an empty
//! result.
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static ASYNC_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"async\s+function\s+(\w+)\s*\(").unwrap());

static EXPORT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:module\.)?exports\s*=\s*\{([^}]+)\}").unwrap());

static USE_CASE_FACTORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"module\.exports\s*=\s*function\s+(\w+)\s*\(\s*\{\s*([^}]*)\s*\}").unwrap()
});

static CONTROLLER_FACTORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?:
            const\s+(\w+)\s*=\s*\(\s*\{\s*([^}]+?)\s*\}\s*\)\s*=>
        |
            function\s+(\w+)\s*\(\s*\{\s*([^}]+?)\s*\}\s*\)
        |
            module\.exports\s*=\s*function\s+(\w+)\s*\(\s*\{\s*([^}]+?)\s*\}\s*\)
        )",
    )
    .unwrap()
});

static ROUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"router\.(post|get|put|delete)\s*\(\s*["'`](.*?)["'`]\s*,\s*\(?\s*(?:req\s*,\s*res\s*|\{\s*req\s*,\s*res\s*\})?\)?\s*=>\s*([\w.]+)\("#,
    )
    .unwrap()
});

/// A use-case factory calling a method on one of its injected dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseCaseLink {
    pub use_case_function: String,
    /// `<dependency>.<method>`
    pub calls_db_function: String,
}

/// A controller factory receiving an injected use case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerLink {
    pub controller_function: String,
    pub calls_use_case: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    /// Upper-cased HTTP verb.
    pub method: String,
    pub path: String,
    pub handler: String,
}

impl RouteSpec {
    /// Single-line text stored as the route's chunk content.
    pub fn describe(&self) -> String {
        format!("{} {} -> {}", self.method, self.path, self.handler)
    }
}

fn split_names(block: &str) -> impl Iterator<Item = &str> {
    block.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Names defined by a data-access file: `async function` declarations plus
/// the entries of the trailing named-export block.
pub fn extract_db_functions(content: &str) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = ASYNC_FUNCTION
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .collect();

    if let Some(caps) = EXPORT_BLOCK.captures_iter(content).last() {
        for entry in split_names(&caps[1]) {
            // `{ getEvent: findEvent }` exports the key
            let name = entry.split(':').next().unwrap_or(entry).trim();
            if !name.is_empty() {
                names.insert(name.to_string());
            }
        }
    }

    names
}

/// Call links of a use-case file shaped as
/// `module.exports = function makeX({ depA, depB }) { ... depA.method(...) ... }`.
///
/// Every call site produces a link, repeated calls included.
pub fn extract_use_case_links(content: &str) -> Vec<UseCaseLink> {
    let Some(caps) = USE_CASE_FACTORY.captures(content) else {
        return Vec::new();
    };
    let use_case_name = &caps[1];

    let mut links = Vec::new();
    for dependency in split_names(&caps[2]) {
        let Ok(call_re) = Regex::new(&format!(r"{}\.(\w+)\s*\(", regex::escape(dependency)))
        else {
            continue;
        };
        for call in call_re.captures_iter(content) {
            links.push(UseCaseLink {
                use_case_function: use_case_name.to_string(),
                calls_db_function: format!("{}.{}", dependency, &call[1]),
            });
        }
    }

    links
}

/// Injection links of a controller file. Recognizes
/// `const makeX = ({ a }) =>`, `function makeX({ a })` and
/// `module.exports = function makeX({ a })`.
pub fn extract_controller_links(content: &str) -> Vec<ControllerLink> {
    let mut links = Vec::new();

    for caps in CONTROLLER_FACTORY.captures_iter(content) {
        let factory = caps.get(1).or(caps.get(3)).or(caps.get(5));
        let injected = caps.get(2).or(caps.get(4)).or(caps.get(6));

        if let (Some(factory), Some(injected)) = (factory, injected) {
            for name in split_names(injected.as_str()) {
                links.push(ControllerLink {
                    controller_function: factory.as_str().to_string(),
                    calls_use_case: name.to_string(),
                });
            }
        }
    }

    links
}

/// Router declarations, matched one line at a time; at most one per line.
pub fn extract_routes(content: &str) -> Vec<RouteSpec> {
    content
        .lines()
        .filter_map(|line| ROUTE.captures(line))
        .map(|caps| RouteSpec {
            method: caps[1].to_uppercase(),
            path: caps[2].to_string(),
            handler: caps[3].trim().to_string(),
        })
        .collect()
}
