use structopt::StructOpt;
use cortex::core::fileutil::SearchPath;
use cortex::core::parameterised::{self, ParameterisedProcedural, RenderFlags};
use cortex::core::registry::ProceduralRegistry;
use cortex::core::renderer::Renderer;
use cortex::renderers::capturing::CapturingRenderer;
use cortex::renderers::recording::{ProceduralMode, RecordingRenderer};
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{anyhow, Context, Result};
use fern::colors::{ColoredLevelConfig, Color};
use log::info;

#[derive(StructOpt, Debug)]
#[structopt(name = "cortex")]
struct Args {
    /// set LOG verbosity
    #[structopt(short, long)]
    verbose: bool,

    /// Log file to write to.
    /// Default: cortex.log in the working directory.
    #[structopt(short, long)]
    logdir: Option<PathBuf>,

    /// Print all logging messages to stderr
    #[structopt(short = "e", long)]
    logtostderr: bool,

    /// Use specified number of threads for procedural expansion
    #[structopt(short, long, default_value = "0")]
    nthreads: u8,

    /// Print the renderer calls the procedural makes instead of its
    /// parameters and bound.
    #[structopt(short, long)]
    cat: bool,

    /// Capture the procedural into a Group hierarchy and print it
    #[structopt(short = "g", long)]
    capture: bool,

    /// Render deferred procedurals at the end of the world block.
    /// Only used with --cat.
    #[structopt(short, long)]
    deferred: bool,

    /// Colon separated directories searched for files named by procedurals
    #[structopt(short, long, default_value = ".")]
    searchpath: String,

    /// Set a parameter, as name=value. Nested parameters use dotted names.
    #[structopt(short, long = "param", number_of_values = 1)]
    param: Vec<String>,

    /// Procedural class version. Default: newest registered.
    #[structopt(long)]
    class_version: Option<u32>,

    /// Name of a registered procedural class
    procedural: String
}

fn setup_logging(verbose: bool, logdir: PathBuf, stderr: bool) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow);
    let clevel = colors.clone().info(Color::Green);

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let file_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(fern::log_file(logdir)?);

    let stderr_config = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{color_line}[{level}] {message}\x1B[0m",
                color_line = format_args!("\x1B[{}m", colors.get_color(&record.level()).to_fg_str()),
                level = clevel.color(record.level()),
                message = message,
            ));
        })
        .chain(std::io::stderr());

    let mut base_config = fern::Dispatch::new()
        .level(level)
        .chain(file_config);

    if stderr { base_config = base_config.chain(stderr_config); }
    base_config.apply()?;

    Ok(())
}

fn apply_parameters(procedural: &mut dyn ParameterisedProcedural, params: &[String]) -> Result<()> {
    for p in params {
        let mut parts = p.splitn(2, '=');
        let name = parts.next().unwrap_or_default();
        let value = parts
            .next()
            .ok_or_else(|| anyhow!("expected name=value, got \"{}\"", p))?;

        procedural
            .parameters_mut()
            .set_value_from_str(name, value)
            .with_context(|| format!("setting parameter \"{}\"", name))?;
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Args = Args::from_args();
    let nthreads = match args.nthreads {
        0 => num_cpus::get(),
        n => n as usize
    };

    rayon::ThreadPoolBuilder::new().num_threads(nthreads).build_global()?;

    let logdir = args.logdir.unwrap_or_else(|| PathBuf::from("cortex.log"));
    setup_logging(args.verbose, logdir, args.logtostderr)?;

    let registry = ProceduralRegistry::with_builtins(SearchPath::parse(&args.searchpath));
    let mut procedural = registry.load(&args.procedural, args.class_version)?;
    apply_parameters(procedural.as_mut(), &args.param)?;

    let procedural: Arc<dyn ParameterisedProcedural> = Arc::from(procedural);
    info!("Loaded procedural \"{}\"", args.procedural);

    if args.cat {
        let mode = if args.deferred { ProceduralMode::Deferred } else { ProceduralMode::Immediate };
        let mut renderer = RecordingRenderer::new(mode);

        renderer.world_begin()?;
        parameterised::render(&procedural, &mut renderer, &RenderFlags::default())?;
        renderer.world_end()?;

        print!("{}", renderer);
    }

    if args.capture {
        let mut renderer = CapturingRenderer::new();

        renderer.world_begin()?;
        parameterised::render(&procedural, &mut renderer, &RenderFlags::default())?;
        renderer.world_end()?;

        if let Some(world) = renderer.world() {
            println!("{:#?}", world);
        }
    }

    if !args.cat && !args.capture {
        print!("{}", procedural.parameters());
        println!("bound {}", parameterised::bound(procedural.as_ref())?);
    }

    Ok(())
}
