use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memo_map::MemoMap;

use crate::error::{Error, ErrorKind};
use crate::template::{CompileOptions, CompiledTemplate};

type LoadFunc = dyn for<'a> Fn(&'a str) -> Result<Option<String>, Error> + Send + Sync;

/// Internal registry of named templates.
///
/// Templates are added explicitly or fetched on first use through the
/// loader.  Loaded templates are compiled once and stay registered until
/// they are removed.
#[derive(Clone, Default)]
pub(crate) struct TemplateStore {
    loader: Option<Arc<LoadFunc>>,
    templates: MemoMap<Arc<str>, Arc<CompiledTemplate>>,
}

impl fmt::Debug for TemplateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.templates.keys()).finish()
    }
}

impl TemplateStore {
    pub fn insert(
        &mut self,
        name: &str,
        source: &str,
        options: &CompileOptions,
    ) -> Result<(), Error> {
        let compiled = ok!(CompiledTemplate::new(Arc::from(source), options));
        self.templates.replace(Arc::from(name), Arc::new(compiled));
        Ok(())
    }

    pub fn remove(&mut self, name: &str) {
        self.templates.remove(name);
    }

    pub fn clear(&mut self) {
        self.templates.clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Looks up a template, falling back to the loader.
    ///
    /// `options` are used to compile templates coming from the loader.
    pub fn get(
        &self,
        name: &str,
        options: &CompileOptions,
    ) -> Result<&Arc<CompiledTemplate>, Error> {
        let name: Arc<str> = name.into();
        self.templates
            .get_or_try_insert(&name.clone(), || -> Result<_, Error> {
                let source = match self.loader {
                    Some(ref loader) => ok!(loader(&name)),
                    None => return Err(Error::new_not_found(&name, false)),
                };
                let source = ok!(source.ok_or_else(|| Error::new_not_found(&name, true)));
                tracing::debug!(target: "minimus::loader", name = &*name, "autoloaded template");
                CompiledTemplate::new(Arc::from(source), options).map(Arc::new)
            })
    }

    pub fn set_loader<F>(&mut self, f: F)
    where
        F: Fn(&str) -> Result<Option<String>, Error> + Send + Sync + 'static,
    {
        self.loader = Some(Arc::new(f));
    }

    pub fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<CompiledTemplate>)> {
        self.templates
            .iter()
            .map(|(name, template)| (&**name, template))
    }
}

/// Safely joins two paths.
pub fn safe_join(base: &Path, template: &str) -> Option<PathBuf> {
    let mut rv = base.to_path_buf();
    for segment in template.split('/') {
        if segment.starts_with('.') || segment.contains('\\') {
            return None;
        }
        rv.push(segment);
    }
    Some(rv)
}

fn read_template(path: PathBuf) -> Result<Option<String>, Error> {
    match fs::read_to_string(path) {
        Ok(result) => Ok(Some(result)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(
            Error::new(ErrorKind::TemplateNotFound, "could not read template").with_source(err),
        ),
    }
}

/// Helper to load templates from a given directory.
///
/// This creates a dynamic loader which looks up templates in the
/// given directory.  Templates that start with a dot (`.`) or are contained in
/// a folder starting with a dot cannot be loaded.
///
/// # Example
///
/// ```rust
/// # use minimus::{path_loader, Environment};
/// fn create_env() -> Environment {
///     let mut env = Environment::new();
///     env.set_loader(path_loader("path/to/templates"));
///     env
/// }
/// ```
pub fn path_loader<'x, P: AsRef<Path> + 'x>(
    dir: P,
) -> impl for<'a> Fn(&'a str) -> Result<Option<String>, Error> + Send + Sync + 'static {
    let dir = dir.as_ref().to_path_buf();
    move |name| match safe_join(&dir, name) {
        Some(path) => read_template(path),
        None => Ok(None),
    }
}

/// Like [`path_loader`] but appends an extension to the template name.
///
/// With the extension `mustache` the template `users/list` is loaded from
/// `<dir>/users/list.mustache`.
pub fn path_loader_with_extension<'x, P: AsRef<Path> + 'x>(
    dir: P,
    extension: &str,
) -> impl for<'a> Fn(&'a str) -> Result<Option<String>, Error> + Send + Sync + 'static {
    let dir = dir.as_ref().to_path_buf();
    let extension = extension.trim_start_matches('.').to_string();
    move |name| match safe_join(&dir, &format!("{name}.{extension}")) {
        Some(path) => read_template(path),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_safe_join() {
        assert_eq!(
            safe_join(Path::new("foo"), "bar/baz"),
            Some(PathBuf::from("foo").join("bar").join("baz"))
        );
        assert_eq!(safe_join(Path::new("foo"), ".bar/baz"), None);
        assert_eq!(safe_join(Path::new("foo"), "bar/.baz"), None);
        assert_eq!(safe_join(Path::new("foo"), "bar/../baz"), None);
    }

    #[test]
    fn test_store_without_loader() {
        let mut store = TemplateStore::default();
        store
            .insert("hello", "Hi {{name}}", &CompileOptions::default())
            .unwrap();
        assert!(store.contains("hello"));
        let err = store.get("missing", &CompileOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
        assert!(err.to_string().contains("autoload disabled"));
        store.remove("hello");
        assert!(!store.contains("hello"));
    }

    #[test]
    fn test_store_with_loader() {
        let mut store = TemplateStore::default();
        store.set_loader(|name| {
            Ok(match name {
                "known" => Some("{{x}}".into()),
                _ => None,
            })
        });
        let compiled = store.get("known", &CompileOptions::default()).unwrap();
        assert_eq!(compiled.source(), "{{x}}");
        assert!(store.contains("known"));
        let err = store.get("unknown", &CompileOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
        assert!(!err.to_string().contains("autoload disabled"));
    }
}
