use crate::commands::load_data;
use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use tracing::debug;

use osml_engine::{parse_document, EvalError, ProcessorConfig, TemplateLibrary, TemplateProcessor};

/// Process a template document and print the result
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Path to the template XML document
    pub template: PathBuf,

    /// JSON document bound as the `Top` scope
    #[arg(short, long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Template library documents (`<Templates>` root), registered in order
    #[arg(short, long = "library", value_name = "FILE")]
    pub libraries: Vec<PathBuf>,

    /// Processor configuration (YAML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Library document providing os:Name, os:Badge and os:PeopleSelector
    #[arg(long, value_name = "FILE")]
    pub builtin_library: Option<PathBuf>,
}

pub fn execute(args: RenderArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ProcessorConfig::from_file(path)?,
        None => ProcessorConfig::default(),
    };
    if let Some(path) = &args.builtin_library {
        config = config.with_builtin_library(path);
    }

    let mut library = TemplateLibrary::from_config(&config);
    for path in &args.libraries {
        let xml = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read template library: {}", path.display()))?;
        library.add_template_library(&xml)?;
        output::step("Loaded", path);
    }

    debug!(templates = library.len(), "template libraries registered");

    let source = std::fs::read_to_string(&args.template)
        .wrap_err_with(|| format!("Failed to read template: {}", args.template.display()))?;
    let mut doc = parse_document(&source)?;
    let top = load_data(args.data.as_deref())?;

    output::step("Rendering", &args.template);
    let root = doc.root();
    let mut processor = TemplateProcessor::new(config);
    if let Err(e) = processor.process(&mut doc, root, top, &mut library) {
        output::failure(&e, e.source.as_ref().map(EvalError::fragment));
        std::process::exit(1);
    }

    println!("{}", doc.to_xml(root));
    if processor.flash_embedded() {
        output::note("template embeds flash content");
    }
    Ok(())
}
