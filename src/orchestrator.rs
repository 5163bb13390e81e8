use crate::action_id::compare_action_ids;
use crate::annotation::{Classifier, TagDialect, TagGrammar, UnknownKeyPolicy};
use crate::error::{Error, Result};
use crate::parser::{Declaration, DeclarationParser};
use crate::registry::{MatchStrategy, TypeRegistry};
use crate::renderer::{CustomTypeLayout, DefaultPolicy, DocRenderer, RenderOptions, ValueColumn};
use crate::resolver::{ActionDoc, ActionResolver};
use crate::scanner::{PackageScanner, PackageSource, SourceFile};
use crate::serializer::{serialize_json, serialize_yaml, write_to_file, OutputFormat};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Settings of one generation run.
#[derive(Debug, Clone, Default)]
pub struct GeneratorConfig {
    pub dialect: TagDialect,
    /// Attribute name to read; the dialect's own tag when `None`
    pub tag: Option<String>,
    pub unknown_keys: UnknownKeyPolicy,
    pub match_strategy: MatchStrategy,
    pub layout: CustomTypeLayout,
    pub default_policy: DefaultPolicy,
    pub format: OutputFormat,
    /// Synthesize a minimal action for action files that declare no root record
    pub placeholders: bool,
    /// Wall-clock budget for the whole run
    pub timeout: Option<Duration>,
}

impl GeneratorConfig {
    pub fn tag(&self) -> &str {
        self.tag
            .as_deref()
            .unwrap_or_else(|| self.dialect.default_tag())
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            layout: self.layout,
            value_column: if self.dialect.has_required_marker() {
                ValueColumn::Required
            } else {
                ValueColumn::Default
            },
            default_policy: self.default_policy,
        }
    }
}

/// The resolved actions of one package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDoc {
    pub name: String,
    /// Sorted by numeric action id
    pub actions: Vec<ActionDoc>,
    /// Files skipped and actions dropped while documenting the package
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Shared state of the package units of one run: the deadline and the abort flag
/// raised by the first unit that fails.
struct RunGuard {
    deadline: Option<Instant>,
    aborted: AtomicBool,
}

impl RunGuard {
    fn new(timeout: Option<Duration>) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
            aborted: AtomicBool::new(false),
        }
    }

    fn check(&self, package: &str) -> Result<()> {
        if self.aborted.load(Ordering::Relaxed) {
            return Err(Error::Aborted);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Error::DeadlineExceeded {
                package: package.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.aborted.store(true, Ordering::Relaxed);
        }
        result
    }
}

/// Request half, response half or whole of an action, keyed by id while a package is
/// being documented.
#[derive(Default)]
struct PendingAction {
    whole: Option<ActionDoc>,
    request: Option<ActionDoc>,
    response: Option<ActionDoc>,
}

impl PendingAction {
    fn slot(&mut self, side: Option<Classifier>) -> &mut Option<ActionDoc> {
        match side {
            None => &mut self.whole,
            Some(Classifier::Request) => &mut self.request,
            Some(Classifier::Response) => &mut self.response,
        }
    }

    fn finish(self, action_id: &str) -> ActionDoc {
        if let Some(whole) = self.whole {
            return whole;
        }
        let request = self.request.unwrap_or_else(|| ActionDoc::new(action_id, ""));
        let response = self.response.unwrap_or_else(|| ActionDoc::new(action_id, ""));
        ActionResolver::merge(request, response)
    }
}

/// Package orchestrator - documents every package under a root, one parallel unit per
/// package.
///
/// Units share nothing but the [`RunGuard`]: each builds its own registry, resolves its
/// own actions and renders its own document. The first failing unit aborts the run.
pub struct PackageOrchestrator {
    config: GeneratorConfig,
}

impl PackageOrchestrator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Documents every package under `root`, returning rendered documents by package
    /// name. Packages without any documented action are left out.
    pub fn run(&self, root: &Path) -> Result<BTreeMap<String, String>> {
        let rendered = self.fan_out(root, |package, guard| {
            let doc = self.document(package, guard)?;
            let content = self.render(&doc)?;
            Ok((doc, content))
        })?;

        Ok(rendered
            .into_iter()
            .map(|(doc, content)| (doc.name, content))
            .collect())
    }

    /// Documents every package under `root` without rendering.
    pub fn collect(&self, root: &Path) -> Result<BTreeMap<String, PackageDoc>> {
        let docs = self.fan_out(root, |package, guard| {
            let doc = self.document(package, guard)?;
            Ok((doc, ()))
        })?;

        Ok(docs.into_iter().map(|(doc, ())| (doc.name.clone(), doc)).collect())
    }

    /// Documents every package under `root` and writes `<package>.<ext>` into
    /// `out_dir`, returning the written paths sorted.
    pub fn generate(&self, root: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let extension = self.config.format.extension();
        let written = self.fan_out(root, |package, guard| {
            let doc = self.document(package, guard)?;
            let content = self.render(&doc)?;
            guard.check(&package.name)?;
            let path = out_dir.join(format!("{}.{}", doc.name, extension));
            write_to_file(&content, &path)?;
            info!("Wrote {} actions of {} to {}", doc.actions.len(), doc.name, path.display());
            Ok((doc, path))
        })?;

        let mut paths: Vec<PathBuf> = written.into_iter().map(|(_, path)| path).collect();
        paths.sort();
        Ok(paths)
    }

    /// Renders a package document in the configured format.
    pub fn render(&self, doc: &PackageDoc) -> Result<String> {
        match self.config.format {
            OutputFormat::Markdown => DocRenderer::new(self.config.render_options()).render(&doc.actions),
            OutputFormat::Json => serialize_json(doc),
            OutputFormat::Yaml => serialize_yaml(doc),
        }
    }

    /// Documents one package on the calling thread.
    pub fn document_package(&self, package: &PackageSource) -> Result<PackageDoc> {
        self.document(package, &RunGuard::new(self.config.timeout))
    }

    /// Runs `unit` for every package in parallel and joins the results, keeping the
    /// packages that documented at least one action.
    fn fan_out<T, F>(&self, root: &Path, unit: F) -> Result<Vec<(PackageDoc, T)>>
    where
        T: Send,
        F: Fn(&PackageSource, &RunGuard) -> Result<(PackageDoc, T)> + Sync,
    {
        let scan = PackageScanner::new(root.to_path_buf()).scan()?;
        info!("Found {} packages under {}", scan.packages.len(), root.display());
        for warning in &scan.warnings {
            warn!("{}", warning);
        }

        let guard = RunGuard::new(self.config.timeout);
        let results: Vec<Result<(PackageDoc, T)>> = scan
            .packages
            .par_iter()
            .map(|package| guard.track(unit(package, &guard)))
            .collect();

        let mut done = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok((doc, _)) if doc.actions.is_empty() => {
                    debug!("Package {} documents no actions, skipped", doc.name);
                }
                Ok(pair) => done.push(pair),
                Err(Error::Aborted) => {
                    if first_error.is_none() {
                        first_error = Some(Error::Aborted);
                    }
                }
                Err(e) => {
                    if matches!(first_error, None | Some(Error::Aborted)) {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(done),
        }
    }

    fn document(&self, package: &PackageSource, guard: &RunGuard) -> Result<PackageDoc> {
        debug!("Documenting package {}", package.name);

        let grammar: Box<dyn TagGrammar> = self.config.dialect.grammar(self.config.unknown_keys);
        let parser = DeclarationParser::new(self.config.tag());
        let mut warnings = Vec::new();
        let mut declarations: Vec<Declaration> = Vec::new();
        let mut type_names: HashMap<&Path, Vec<String>> = HashMap::new();

        guard.check(&package.name)?;
        let paths: Vec<PathBuf> = package.files.iter().map(|f| f.path.clone()).collect();
        for (file, result) in package.files.iter().zip(parser.list_many(&paths)) {
            match result {
                Ok(found) => {
                    let names = found.iter().map(|d| d.type_name.clone()).collect();
                    type_names.insert(file.path.as_path(), names);
                    declarations.extend(found);
                }
                Err(e) => warnings.push(format!("skipped {}: {}", file.path.display(), e)),
            }
        }

        let registry =
            TypeRegistry::from_declarations(&declarations, grammar.as_ref(), self.config.match_strategy)?;
        let resolver = ActionResolver::new(&registry, grammar.as_ref());

        let mut order: Vec<String> = Vec::new();
        let mut pending: HashMap<String, PendingAction> = HashMap::new();

        for file in package.action_sources() {
            guard.check(&package.name)?;
            let Some(names) = type_names.get(file.path.as_path()) else {
                continue;
            };
            let file_id = file.action_id.as_deref();
            let mut roots = 0;

            for type_name in names {
                let Some(action_id) = grammar.action_id(type_name, file_id) else {
                    continue;
                };
                roots += 1;

                let doc = match resolver.resolve(&action_id, type_name) {
                    Ok(doc) => doc,
                    Err(e) => {
                        warnings.push(format!("{}: {}", file.path.display(), e));
                        continue;
                    }
                };

                let entry = pending.entry(action_id.clone()).or_insert_with(|| {
                    order.push(action_id.clone());
                    PendingAction::default()
                });
                let slot = entry.slot(grammar.root_classifier(type_name));
                if slot.is_some() {
                    warnings.push(format!(
                        "duplicate action {} from {} in {}, keeping the first",
                        action_id,
                        type_name,
                        file.path.display()
                    ));
                } else {
                    *slot = Some(doc);
                }
            }

            if roots == 0 {
                self.no_roots(file, &mut order, &mut pending, &mut warnings);
            }
        }

        let mut actions = Vec::with_capacity(order.len());
        for action_id in order {
            let Some(entry) = pending.remove(&action_id) else {
                continue;
            };
            let action = entry.finish(&action_id);
            if action.is_empty() {
                warnings.push(format!("action {} documents no fields, dropped", action_id));
                continue;
            }
            actions.push(action);
        }
        actions.sort_by(|a, b| compare_action_ids(&a.action_id, &b.action_id));

        debug!(
            "Package {}: {} actions, {} warnings",
            package.name,
            actions.len(),
            warnings.len()
        );
        Ok(PackageDoc {
            name: package.name.clone(),
            actions,
            warnings,
        })
    }

    fn no_roots(
        &self,
        file: &SourceFile,
        order: &mut Vec<String>,
        pending: &mut HashMap<String, PendingAction>,
        warnings: &mut Vec<String>,
    ) {
        let Some(action_id) = file.action_id.clone() else {
            return;
        };

        if !self.config.placeholders || pending.contains_key(&action_id) {
            debug!("No documented action in {}", file.path.display());
            return;
        }

        debug!("Synthesizing placeholder action {} for {}", action_id, file.path.display());
        warnings.push(format!(
            "placeholder action {} for {}",
            action_id,
            file.path.display()
        ));
        order.push(action_id.clone());
        pending.insert(
            action_id.clone(),
            PendingAction {
                whole: Some(ActionDoc::placeholder(action_id)),
                ..PendingAction::default()
            },
        );
    }
}
