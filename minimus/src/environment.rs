use std::borrow::{Borrow, Cow};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use memo_map::MemoMap;
use serde::Serialize;

use crate::error::Error;
use crate::loader::TemplateStore;
use crate::template::{CompileOptions, CompiledTemplate, Template};

/// Resolves partial names to template source.
///
/// Partials are looked up at render time, so the same compiled template can
/// be rendered with different partials.  The trait is implemented for `()`
/// (no partials), for maps from names to source and for references to
/// those.
pub trait Partials {
    /// Returns the source of the partial with the given name.
    fn get_partial(&self, name: &str) -> Option<Cow<'_, str>>;
}

impl Partials for () {
    fn get_partial(&self, _name: &str) -> Option<Cow<'_, str>> {
        None
    }
}

impl<K, V> Partials for BTreeMap<K, V>
where
    K: Borrow<str> + Ord,
    V: AsRef<str>,
{
    fn get_partial(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(|source| Cow::Borrowed(source.as_ref()))
    }
}

impl<K, V, S> Partials for HashMap<K, V, S>
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<str>,
    S: BuildHasher,
{
    fn get_partial(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(|source| Cow::Borrowed(source.as_ref()))
    }
}

impl<T: Partials + ?Sized> Partials for &T {
    fn get_partial(&self, name: &str) -> Option<Cow<'_, str>> {
        (**self).get_partial(name)
    }
}

/// An abstraction that holds the engine configuration.
///
/// The environment owns all state of the engine: the cache of compiled
/// templates, the default [`CompileOptions`] and the registry of named
/// templates.  Nothing is shared between environments.
///
/// ```
/// # use minimus::{Environment, context};
/// let mut env = Environment::new();
/// env.add_template("hello", "Hello {{name}}!").unwrap();
/// let rv = env.render_named("hello", context!(name => "World"), ()).unwrap();
/// assert_eq!(rv, "Hello World!");
/// ```
///
/// Compiled templates are cached by their exact source text.  The first
/// compilation of a text decides the options the cached template carries;
/// later compiles of the same text return the cached template regardless of
/// the options passed.  Disable the cache with
/// [`CompileOptions::cache`] to force a fresh compile.
#[derive(Clone, Default)]
pub struct Environment {
    cache: MemoMap<Arc<str>, Arc<CompiledTemplate>>,
    options: CompileOptions,
    templates: TemplateStore,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("options", &self.options)
            .field("cached", &self.cache_len())
            .field("templates", &self.templates)
            .field("autoload", &self.templates.has_loader())
            .finish()
    }
}

impl Environment {
    /// Creates a new environment with default options.
    pub fn new() -> Environment {
        Environment::default()
    }

    /// Returns the default compile options.
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Sets the default compile options.
    ///
    /// These are used by [`compile`](Self::compile), [`render`](Self::render),
    /// for partials and for templates fetched by the loader.
    pub fn set_options(&mut self, options: CompileOptions) {
        self.options = options;
    }

    /// Compiles template source with the default options.
    ///
    /// ```
    /// # use minimus::{Environment, context};
    /// let env = Environment::new();
    /// let tmpl = env.compile("{{#list}}{{n}}-{{/list}}").unwrap();
    /// let view = context!(list => vec![context!(n => 1), context!(n => 2)]);
    /// assert_eq!(tmpl.render(view, ()).unwrap(), "1-2-");
    /// ```
    pub fn compile(&self, source: &str) -> Result<Template<'_>, Error> {
        self.get_compiled(source, &self.options)
            .map(|compiled| Template::new(self, compiled))
    }

    /// Compiles template source with explicit options.
    pub fn compile_with_options(
        &self,
        source: &str,
        options: CompileOptions,
    ) -> Result<Template<'_>, Error> {
        self.get_compiled(source, &options)
            .map(|compiled| Template::new(self, compiled))
    }

    /// Compiles and renders template source in one go.
    ///
    /// ```
    /// # use minimus::{Environment, context};
    /// let env = Environment::new();
    /// let rv = env.render("Hi {{name}}!", context!(name => "World"), ());
    /// assert_eq!(rv.unwrap(), "Hi World!");
    /// ```
    pub fn render<S: Serialize, P: Partials>(
        &self,
        source: &str,
        view: S,
        partials: P,
    ) -> Result<String, Error> {
        ok!(self.compile(source)).render(view, partials)
    }

    /// Removes all compiled templates from the cache.
    ///
    /// Named templates are not affected.
    pub fn clear_cache(&mut self) {
        tracing::debug!(target: "minimus::cache", "clearing template cache");
        self.cache.clear();
    }

    /// Returns the number of cached compilations.
    pub fn cache_len(&self) -> usize {
        self.cache.keys().count()
    }

    pub(crate) fn get_compiled(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<Arc<CompiledTemplate>, Error> {
        if !options.uses_cache() {
            tracing::trace!(target: "minimus::cache", "cache bypassed");
            return CompiledTemplate::new(Arc::from(source), options).map(Arc::new);
        }
        let key: Arc<str> = Arc::from(source);
        let mut missed = false;
        let rv = ok!(self.cache.get_or_try_insert(&key, || {
            missed = true;
            CompiledTemplate::new(key.clone(), options).map(Arc::new)
        }));
        tracing::trace!(
            target: "minimus::cache",
            hit = !missed,
            bytes = source.len(),
            "template cache lookup"
        );
        Ok(rv.clone())
    }

    /// Registers a template under a name.
    ///
    /// The template is compiled right away with the default options and the
    /// name as file label.  An existing template of the same name is
    /// replaced.
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<(), Error> {
        let options = self.options.clone().file(name);
        self.templates.insert(name, source, &options)
    }

    /// Registers a template under a name with explicit options.
    ///
    /// Named templates live in the registry, the cache flag of the options
    /// has no effect on them.
    pub fn add_template_with_options(
        &mut self,
        name: &str,
        source: &str,
        options: CompileOptions,
    ) -> Result<(), Error> {
        self.templates.insert(name, source, &options)
    }

    /// Returns `true` if a template is registered under the name.
    ///
    /// This does not consult the loader.
    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains(name)
    }

    /// Fetches a template by name.
    ///
    /// If no template was registered under the name and a loader is
    /// configured the loader is asked for the source.  The loaded template
    /// is compiled and registered.  Without a loader, or if the loader does
    /// not know the template, an error of kind
    /// [`TemplateNotFound`](crate::ErrorKind::TemplateNotFound) is returned.
    pub fn get_template(&self, name: &str) -> Result<Template<'_>, Error> {
        let options = self.options.clone().file(name);
        self.templates
            .get(name, &options)
            .map(|compiled| Template::new(self, compiled.clone()))
    }

    /// Renders a template by name.
    pub fn render_named<S: Serialize, P: Partials>(
        &self,
        name: &str,
        view: S,
        partials: P,
    ) -> Result<String, Error> {
        ok!(self.get_template(name)).render(view, partials)
    }

    /// Removes a template by name.
    pub fn remove_template(&mut self, name: &str) {
        self.templates.remove(name);
    }

    /// Removes all registered templates.
    pub fn clear_templates(&mut self) {
        self.templates.clear();
    }

    /// Returns an iterator over the registered templates.
    pub fn templates(&self) -> impl Iterator<Item = (&str, Template<'_>)> {
        self.templates
            .iter()
            .map(move |(name, compiled)| (name, Template::new(self, compiled.clone())))
    }

    /// Sets a loader for templates that were not registered.
    ///
    /// The loader receives the template name and returns the source or
    /// `None` if it does not know the template.
    ///
    /// ```
    /// # use minimus::Environment;
    /// let mut env = Environment::new();
    /// env.set_loader(|name| Ok(match name {
    ///     "layout" => Some("<main>{{content}}</main>".into()),
    ///     _ => None,
    /// }));
    /// assert!(env.get_template("layout").is_ok());
    /// assert!(env.has_template("layout"));
    /// ```
    pub fn set_loader<F>(&mut self, f: F)
    where
        F: Fn(&str) -> Result<Option<String>, Error> + Send + Sync + 'static,
    {
        self.templates.set_loader(f);
    }
}

/// Compiles and renders template source with a thread local environment.
///
/// This is a shortcut for one-off renders.  The thread local environment
/// uses the default options and keeps its own cache.
///
/// ```
/// # use minimus::context;
/// let rv = minimus::render("{{^flag}}shown{{/flag}}", context!(flag => false), ());
/// assert_eq!(rv.unwrap(), "shown");
/// ```
pub fn render<S: Serialize, P: Partials>(source: &str, view: S, partials: P) -> Result<String, Error> {
    thread_local! {
        static ENV: Environment = Environment::new();
    }
    ENV.with(|env| env.render(source, view, partials))
}
