//! Annotate a passage of a local HTML file from the command line.
//!
//! ```text
//! annotate <file.html> <quote> <note> [config.json]
//! ```
//!
//! The first occurrence of `quote` is selected the way a user would select it with the
//! mouse, `note` is typed into the editor and the form is submitted. The payload handed
//! to storage is printed to stdout as JSON.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use marginalia::{
    Annotation, AnnotationStore, Annotator, AnnotatorConfig, Collaborators, MemoryStore, StoreCallback,
};
use marginalia_dom::{Boundary, DocumentConfig, LiveRange};
use marginalia_html::HtmlDocument;
use marginalia_net::Provider;
use marginalia_traits::shell::ShellProvider;
use marginalia_traits::{DomEvent, DomEventData, MouseButtonEvent};
use url::Url;

/// Prints every payload before handing it to an in-memory store
struct PrintingStore(MemoryStore);

impl PrintingStore {
    fn print(action: &str, payload: &Annotation) {
        match serde_json::to_string_pretty(payload) {
            Ok(json) => println!("{action}: {json}"),
            Err(err) => eprintln!("{action}: unprintable payload: {err}"),
        }
    }
}

impl AnnotationStore for PrintingStore {
    fn create(&self, payload: Annotation, done: StoreCallback) {
        Self::print("create", &payload);
        self.0.create(payload, done);
    }

    fn update(&self, payload: Annotation, done: StoreCallback) {
        Self::print("update", &payload);
        self.0.update(payload, done);
    }

    fn delete(&self, payload: Annotation, done: StoreCallback) {
        Self::print("delete", &payload);
        self.0.delete(payload, done);
    }
}

struct TerminalShell;

impl ShellProvider for TerminalShell {
    fn alert(&self, message: &str) {
        eprintln!("{message}");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    #[cfg(feature = "tracing")]
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let (Some(path), Some(quote), Some(note)) = (args.next(), args.next(), args.next()) else {
        return Err("usage: annotate <file.html> <quote> <note> [config.json]".into());
    };
    let config = match args.next() {
        Some(config) => AnnotatorConfig::from_json(&std::fs::read_to_string(config)?)?,
        None => AnnotatorConfig::default(),
    };

    // Turn on the runtime and enter it
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let _guard = rt.enter();

    let path = std::fs::canonicalize(Path::new(&path))?;
    let base_url = Url::from_file_path(&path).map_err(|_| format!("not a file path: {}", path.display()))?;
    let html = std::fs::read_to_string(&path)?;

    let doc = HtmlDocument::from_html(
        &html,
        DocumentConfig {
            base_url: Some(base_url.to_string()),
            net_provider: Some(Provider::shared(None)?),
            shell_provider: Some(Arc::new(TerminalShell)),
            ..Default::default()
        },
    );
    let collaborators = Collaborators {
        store: Box::new(PrintingStore(MemoryStore::new())),
        ..Default::default()
    };
    let mut annotator = Annotator::new(doc.into_inner(), config, collaborators)?;
    annotator.on_signal(|signal| eprintln!("signal: {}", signal.name()));

    select_quote(&mut annotator, &quote)?;
    annotator.set_editor_text(&note);
    submit(&mut annotator)?;

    // Let storage and count requests settle
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if !annotator.poll() && !annotator.is_drawing() {
            std::thread::sleep(Duration::from_millis(20));
        }
    }
    Ok(())
}

fn select_quote(annotator: &mut Annotator, quote: &str) -> Result<(), Box<dyn Error>> {
    let doc = annotator.document();
    let (text, offset) = doc
        .text_nodes_in(annotator.root())
        .into_iter()
        .find_map(|text| {
            let content = &doc.tree()[text].text_data()?.content;
            let byte_offset = content.find(quote)?;
            Some((text, content[..byte_offset].chars().count()))
        })
        .ok_or_else(|| format!("{quote:?} does not occur in the document"))?;
    let target = doc.tree()[text].parent.ok_or("quote is not inside an element")?;
    let chain = doc.node_chain(target);
    let range = LiveRange::new(
        Boundary::new(text, offset),
        Boundary::new(text, offset + quote.chars().count()),
    );

    annotator.handle_dom_event(DomEvent::new(
        target,
        DomEventData::MouseDown(MouseButtonEvent::new(0.0, 0.0)),
        chain.clone(),
    ));
    annotator.document_mut().set_selection(range);
    annotator.handle_dom_event(DomEvent::new(
        target,
        DomEventData::MouseUp(MouseButtonEvent::new(0.0, 0.0)),
        chain,
    ));
    Ok(())
}

fn submit(annotator: &mut Annotator) -> Result<(), Box<dyn Error>> {
    let editor = annotator
        .components()
        .editor
        .as_ref()
        .filter(|editor| editor.is_open())
        .ok_or("the selection did not open the editor")?;
    let doc = annotator.document();
    let button = *doc
        .elements_with_class(editor.element(), "annotator-add")
        .first()
        .ok_or("editor has no save control")?;
    let event = DomEvent::new(
        button,
        DomEventData::Click(MouseButtonEvent::new(0.0, 0.0)),
        doc.node_chain(button),
    );
    annotator.handle_dom_event(event);
    Ok(())
}
