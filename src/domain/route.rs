use std::sync::OnceLock;

use compact_str::CompactString;
use fnv::FnvHashMap;
use http::Method;
use regex_lite::Regex;
use strum::EnumString;

use crate::domain::errors::RouteError;

pub type UriVariables = FnvHashMap<String, String>;

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{(.*?)\}").unwrap())
}

/// Request data a handler can ask for, in the order it declares them.
#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Binding {
    Request,
    Headers,
    RawBody,
    Body,
    QueryParams,
    UriVariables,
    /// Any other name; always bound to an absent value.
    #[strum(default)]
    Unrecognized(CompactString),
}

#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(CompactString),
    Pattern(Regex),
    Variable {
        regex: Regex,
        names: Vec<CompactString>,
    },
}

#[derive(Debug, Clone)]
pub struct Route {
    matcher: Matcher,
    methods: Vec<Method>,
    bindings: Vec<Binding>,
}

impl Route {
    fn with_matcher(matcher: Matcher) -> Self {
        Self {
            matcher,
            methods: vec![Method::GET],
            bindings: Vec::new(),
        }
    }

    /// Matches only the identical path.
    pub fn exact(path: &str) -> Self {
        Self::with_matcher(Matcher::Exact(path.into()))
    }

    /// Matches whenever `pattern` matches somewhere in the path. Anchors are
    /// up to the caller.
    pub fn pattern(pattern: &str) -> Result<Self, RouteError> {
        let regex = Regex::new(pattern).map_err(|source| RouteError::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self::with_matcher(Matcher::Pattern(regex)))
    }

    /// Compiles a template such as `/users/{id}/posts/{post}` into an
    /// anchored expression where each placeholder captures one path segment.
    pub fn variable(template: &str) -> Result<Self, RouteError> {
        let mut names = Vec::new();
        let mut pattern = String::from("^");
        let mut last = 0;

        for caps in placeholder().captures_iter(template) {
            let Some(whole) = caps.get(0) else { continue };
            pattern.push_str(&regex_lite::escape(&template[last..whole.start()]));
            pattern.push_str("([^/]*)");
            names.push(caps.get(1).map_or("", |m| m.as_str()).into());
            last = whole.end();
        }
        pattern.push_str(&regex_lite::escape(&template[last..]));
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|source| RouteError::InvalidPattern {
            pattern: template.to_owned(),
            source,
        })?;
        Ok(Self::with_matcher(Matcher::Variable { regex, names }))
    }

    pub fn method(mut self, method: Method) -> Self {
        self.methods = vec![method];
        self
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn bind(mut self, bindings: impl IntoIterator<Item = Binding>) -> Self {
        self.bindings = bindings.into_iter().collect();
        self
    }

    /// Same as [Route::bind], taking the names of the binding vocabulary.
    pub fn bind_names<S: AsRef<str>>(self, names: impl IntoIterator<Item = S>) -> Self {
        let bindings = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                name.parse::<Binding>()
                    .unwrap_or_else(|_| Binding::Unrecognized(name.into()))
            })
            .collect::<Vec<_>>();
        self.bind(bindings)
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn accepted_methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn exact_path(&self) -> Option<&str> {
        match &self.matcher {
            Matcher::Exact(path) => Some(path.as_str()),
            _ => None,
        }
    }

    pub fn accepts(&self, method: &Method) -> bool {
        self.methods.iter().any(|m| m == method)
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        if !self.accepts(method) {
            return false;
        }
        match &self.matcher {
            Matcher::Exact(expected) => expected.as_str() == path,
            Matcher::Pattern(regex) => regex.find(path).is_some_and(|m| m.start() == 0),
            Matcher::Variable { regex, .. } => regex.is_match(path),
        }
    }

    /// Pairs the declared variable names with the segments captured from
    /// `path`. Routes without variables give an empty map.
    pub fn uri_variables(&self, path: &str) -> UriVariables {
        let Matcher::Variable { regex, names } = &self.matcher else {
            return UriVariables::default();
        };
        let Some(caps) = regex.captures(path) else {
            return UriVariables::default();
        };

        names
            .iter()
            .zip(caps.iter().skip(1))
            .map(|(name, value)| {
                let value = value.map(|m| m.as_str()).unwrap_or_default();
                (name.to_string(), value.to_owned())
            })
            .collect()
    }
}
