//! Client-side route table of the single-page front end.
//!
//! The table maps URL paths to page views and symbolic names. It is a static
//! slice, validated once at startup and never mutated.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Page views of the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Home,
    Load,
    About,
    ChunkView,
    Embedding,
    VectorStore,
}

impl View {
    pub fn title(self) -> &'static str {
        match self {
            View::Home => "Home",
            View::Load => "Load",
            View::About => "About",
            View::ChunkView => "Chunk",
            View::Embedding => "Embedding",
            View::VectorStore => "Vector Store",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    View(View),
    Redirect(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path: &'static str,
    pub name: Option<&'static str>,
    pub target: Target,
}

impl Route {
    pub const fn view(path: &'static str, name: &'static str, view: View) -> Self {
        Self {
            path,
            name: Some(name),
            target: Target::View(view),
        }
    }

    pub const fn redirect(path: &'static str, to: &'static str) -> Self {
        Self {
            path,
            name: None,
            target: Target::Redirect(to),
        }
    }
}

pub static ROUTES: &[Route] = &[
    Route::redirect("/", "/home"),
    Route::view("/home", "home", View::Home),
    Route::view("/load", "load", View::Load),
    Route::view("/about", "about", View::About),
    Route::view("/chunk", "chunk", View::ChunkView),
    Route::view("/embedding", "embedding", View::Embedding),
    Route::view("/vectorstore", "vectorstore", View::VectorStore),
];

/// How the front end encodes the current route in the URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryMode {
    /// `/<base>/home`, server must answer every view path
    #[default]
    Web,
    /// `/<base>/#/home`, server only answers the base URL
    Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown history mode '{0}', expected web or hash")]
pub struct UnknownHistoryMode(pub String);

impl FromStr for HistoryMode {
    type Err = UnknownHistoryMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "web" | "history" => Ok(HistoryMode::Web),
            "hash" => Ok(HistoryMode::Hash),
            _ => Err(UnknownHistoryMode(s.to_string())),
        }
    }
}

impl fmt::Display for HistoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HistoryMode::Web => "web",
            HistoryMode::Hash => "hash",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteTableError {
    #[error("duplicate route path '{0}'")]
    DuplicatePath(&'static str),
    #[error("duplicate route name '{0}'")]
    DuplicateName(&'static str),
    #[error("route '{from}' redirects to unknown path '{to}'")]
    DanglingRedirect {
        from: &'static str,
        to: &'static str,
    },
    #[error("route '{0}' is part of a redirect cycle")]
    RedirectCycle(&'static str),
}

/// Outcome of resolving a path against the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub route: &'static Route,
    pub view: View,
    pub redirected: bool,
}

impl Resolved {
    pub fn name(&self) -> &'static str {
        self.route.name.unwrap_or(self.route.path)
    }
}

fn find(table: &'static [Route], path: &str) -> Option<&'static Route> {
    table.iter().find(|r| r.path == path)
}

fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// Follow redirects from `path` until a view is reached.
pub fn resolve_in(table: &'static [Route], path: &str) -> Option<Resolved> {
    let mut route = find(table, normalize(path))?;
    let mut redirected = false;

    for _ in 0..=table.len() {
        match route.target {
            Target::View(view) => {
                return Some(Resolved {
                    route,
                    view,
                    redirected,
                });
            }
            Target::Redirect(to) => {
                route = find(table, to)?;
                redirected = true;
            }
        }
    }
    None
}

pub fn resolve(path: &str) -> Option<Resolved> {
    resolve_in(ROUTES, path)
}

pub fn by_name(name: &str) -> Option<&'static Route> {
    ROUTES.iter().find(|r| r.name == Some(name))
}

/// Check that paths and names are unique and every redirect lands on a view.
pub fn validate(table: &'static [Route]) -> Result<(), RouteTableError> {
    let mut paths = HashSet::new();
    let mut names = HashSet::new();

    for route in table {
        if !paths.insert(route.path) {
            return Err(RouteTableError::DuplicatePath(route.path));
        }
        if let Some(name) = route.name {
            if !names.insert(name) {
                return Err(RouteTableError::DuplicateName(name));
            }
        }
    }

    for route in table {
        if let Target::Redirect(to) = route.target {
            if find(table, to).is_none() {
                return Err(RouteTableError::DanglingRedirect {
                    from: route.path,
                    to,
                });
            }
            if resolve_in(table, route.path).is_none() {
                return Err(RouteTableError::RedirectCycle(route.path));
            }
        }
    }
    Ok(())
}

/// Builds links and serves the application shell for one base URL and
/// history mode.
#[derive(Debug, Clone)]
pub struct ViewRouter {
    base: String,
    mode: HistoryMode,
}

/// What the server answers for a browser navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Redirect(String),
    Shell(Resolved),
    NotFound,
}

impl ViewRouter {
    pub fn new(base_url: &str, mode: HistoryMode) -> Self {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self { base, mode }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn mode(&self) -> HistoryMode {
        self.mode
    }

    /// Link to a route path, honouring base URL and history mode.
    pub fn href_for_path(&self, path: &str) -> String {
        let relative = path.trim_start_matches('/');
        match self.mode {
            HistoryMode::Web => format!("{}{}", self.base, relative),
            HistoryMode::Hash => format!("{}#/{}", self.base, relative),
        }
    }

    pub fn href(&self, name: &str) -> Option<String> {
        by_name(name).map(|r| self.href_for_path(r.path))
    }

    /// Map a request path to a redirect, the shell for a view, or nothing.
    pub fn navigate(&self, request_path: &str) -> Navigation {
        let base_trimmed = self.base.trim_end_matches('/');
        let Some(rest) = request_path.strip_prefix(base_trimmed) else {
            return Navigation::NotFound;
        };
        let route_path = if rest.is_empty() { "/" } else { rest };
        if !route_path.starts_with('/') {
            return Navigation::NotFound;
        }

        match self.mode {
            HistoryMode::Hash => {
                if route_path != "/" {
                    return Navigation::NotFound;
                }
                resolve(route_path).map_or(Navigation::NotFound, Navigation::Shell)
            }
            HistoryMode::Web => match resolve(route_path) {
                Some(resolved) if resolved.redirected => {
                    Navigation::Redirect(self.href_for_path(resolved.route.path))
                }
                Some(resolved) => Navigation::Shell(resolved),
                None => Navigation::NotFound,
            },
        }
    }

    /// Minimal HTML document the front-end bundle mounts into.
    pub fn shell(&self, resolved: &Resolved) -> String {
        let nav: String = ROUTES
            .iter()
            .filter_map(|r| match (r.name, r.target) {
                (Some(name), Target::View(view)) => Some(format!(
                    "<a href=\"{}\" data-route=\"{}\">{}</a>",
                    self.href(name)?,
                    name,
                    view.title()
                )),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n      ");

        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n  <head>\n    <meta charset=\"utf-8\">\n    \
             <base href=\"{base}\">\n    <title>{title} · RAG pipeline</title>\n  </head>\n  \
             <body>\n    <nav>\n      {nav}\n    </nav>\n    \
             <div id=\"app\" data-view=\"{name}\" data-history=\"{mode}\"></div>\n  \
             </body>\n</html>\n",
            base = self.base,
            title = resolved.view.title(),
            nav = nav,
            name = resolved.name(),
            mode = self.mode,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_valid() {
        assert_eq!(validate(ROUTES), Ok(()));
    }

    #[test]
    fn test_root_redirects_to_home() {
        let resolved = resolve("/").unwrap();
        assert!(resolved.redirected);
        assert_eq!(resolved.route.path, "/home");
        assert_eq!(resolved.view, View::Home);
    }

    #[test]
    fn test_every_declared_path_resolves_to_its_view() {
        let expected = [
            ("/home", "home", View::Home),
            ("/load", "load", View::Load),
            ("/about", "about", View::About),
            ("/chunk", "chunk", View::ChunkView),
            ("/embedding", "embedding", View::Embedding),
            ("/vectorstore", "vectorstore", View::VectorStore),
        ];
        for (path, name, view) in expected {
            let resolved = resolve(path).unwrap();
            assert!(!resolved.redirected, "{path}");
            assert_eq!(resolved.view, view);
            assert_eq!(resolved.name(), name);
            assert_eq!(by_name(name).unwrap().path, path);
        }
    }

    #[test]
    fn test_trailing_slash_and_unknown_paths() {
        assert_eq!(resolve("/load/").unwrap().view, View::Load);
        assert!(resolve("/missing").is_none());
        assert!(resolve("").is_none());
        assert!(by_name("missing").is_none());
    }

    #[test]
    fn test_paths_and_names_unique() {
        let paths: HashSet<_> = ROUTES.iter().map(|r| r.path).collect();
        assert_eq!(paths.len(), ROUTES.len());

        let named: Vec<_> = ROUTES.iter().filter_map(|r| r.name).collect();
        let names: HashSet<_> = named.iter().collect();
        assert_eq!(names.len(), named.len());
    }

    #[test]
    fn test_validate_reports_duplicates() {
        static DUP_PATH: &[Route] = &[
            Route::view("/a", "a", View::Home),
            Route::view("/a", "b", View::Load),
        ];
        assert_eq!(validate(DUP_PATH), Err(RouteTableError::DuplicatePath("/a")));

        static DUP_NAME: &[Route] = &[
            Route::view("/a", "same", View::Home),
            Route::view("/b", "same", View::Load),
        ];
        assert_eq!(validate(DUP_NAME), Err(RouteTableError::DuplicateName("same")));
    }

    #[test]
    fn test_validate_reports_bad_redirects() {
        static DANGLING: &[Route] = &[Route::redirect("/", "/nowhere")];
        assert_eq!(
            validate(DANGLING),
            Err(RouteTableError::DanglingRedirect {
                from: "/",
                to: "/nowhere",
            })
        );

        static CYCLE: &[Route] = &[
            Route::redirect("/a", "/b"),
            Route::redirect("/b", "/a"),
        ];
        assert_eq!(validate(CYCLE), Err(RouteTableError::RedirectCycle("/a")));
        assert!(resolve_in(CYCLE, "/a").is_none());
    }

    #[test]
    fn test_history_mode_parsing() {
        assert_eq!("web".parse::<HistoryMode>(), Ok(HistoryMode::Web));
        assert_eq!("HASH".parse::<HistoryMode>(), Ok(HistoryMode::Hash));
        assert!("memory".parse::<HistoryMode>().is_err());
    }

    #[test]
    fn test_href_in_web_mode() {
        let router = ViewRouter::new("/app", HistoryMode::Web);
        assert_eq!(router.base(), "/app/");
        assert_eq!(router.href("chunk").unwrap(), "/app/chunk");
        assert_eq!(router.href("missing"), None);
    }

    #[test]
    fn test_href_in_hash_mode() {
        let router = ViewRouter::new("/", HistoryMode::Hash);
        assert_eq!(router.href("vectorstore").unwrap(), "/#/vectorstore");
    }

    #[test]
    fn test_navigate_web_mode() {
        let router = ViewRouter::new("/", HistoryMode::Web);
        assert_eq!(router.navigate("/"), Navigation::Redirect("/home".to_string()));
        match router.navigate("/embedding") {
            Navigation::Shell(resolved) => assert_eq!(resolved.view, View::Embedding),
            other => panic!("unexpected navigation: {other:?}"),
        }
        assert_eq!(router.navigate("/unknown"), Navigation::NotFound);
    }

    #[test]
    fn test_navigate_with_base_url() {
        let router = ViewRouter::new("/app/", HistoryMode::Web);
        assert_eq!(router.navigate("/app"), Navigation::Redirect("/app/home".to_string()));
        assert_eq!(router.navigate("/app/"), Navigation::Redirect("/app/home".to_string()));
        assert!(matches!(router.navigate("/app/load"), Navigation::Shell(_)));
        assert_eq!(router.navigate("/load"), Navigation::NotFound);
        assert_eq!(router.navigate("/application"), Navigation::NotFound);
    }

    #[test]
    fn test_navigate_hash_mode_serves_only_base() {
        let router = ViewRouter::new("/", HistoryMode::Hash);
        match router.navigate("/") {
            Navigation::Shell(resolved) => assert_eq!(resolved.view, View::Home),
            other => panic!("unexpected navigation: {other:?}"),
        }
        assert_eq!(router.navigate("/load"), Navigation::NotFound);
    }

    #[test]
    fn test_shell_names_view_and_links_every_page() {
        let router = ViewRouter::new("/", HistoryMode::Web);
        let html = router.shell(&resolve("/chunk").unwrap());

        assert!(html.contains("data-view=\"chunk\""));
        assert!(html.contains("<title>Chunk"));
        for route in ROUTES.iter().filter(|r| r.name.is_some()) {
            assert!(html.contains(&format!("href=\"{}\"", route.path)));
        }
    }
}
