use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use crossterm::event::{KeyEvent, KeyEventKind};
use ratatui::DefaultTerminal;
use reclimit::error_display::user_message_from_report;
use reclimit::form::{Form, FormEvent, FormMode};
use reclimit::io::{detect_format, header_of, load_path, save_path};
use reclimit::logging::{self, LogSettings};
use reclimit::request::{conditions_from_args, rules_from_args};
use reclimit::{
    AppConfig, Args, CoercionMode, Command, ConfigManager, Engine, ErrorKind, FileFormat,
    FileOptions, FilterRequest, LimitArgs, OutputKind, ReclimitError, RowCap, SourceArgs,
    UpdateRequest, UploadStore, APP_NAME,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use tracing::{info, warn};

enum AppEvent {
    Key(KeyEvent),
    Resize,
    Exit,
}

/// A source table resolved to a file on disk.
struct ResolvedSource {
    path: PathBuf,
    format: FileFormat,
    /// Set when the source is a stored upload; outputs then go to the store.
    upload: Option<String>,
}

impl ResolvedSource {
    fn output_path(&self, kind: OutputKind, store: &UploadStore) -> PathBuf {
        match &self.upload {
            Some(name) => store.output_path(kind, name),
            None => kind.output_path_for(&self.path),
        }
    }
}

struct Context {
    config: AppConfig,
    engine: Engine,
    options: FileOptions,
    format_hint: Option<FileFormat>,
    store: UploadStore,
}

impl Context {
    fn new(config: AppConfig, format_hint: Option<FileFormat>) -> Result<Self> {
        let engine = Engine::new(config.coercion_policy()?);
        let options = config.file_options();
        let store = config.upload_store(APP_NAME)?;
        Ok(Self {
            config,
            engine,
            options,
            format_hint,
            store,
        })
    }

    fn resolve(&self, source: &SourceArgs) -> Result<ResolvedSource> {
        if let Some(name) = &source.upload {
            let path = self.store.path_of(name)?;
            let format = detect_format(&path, self.format_hint)?;
            return Ok(ResolvedSource {
                path,
                format,
                upload: Some(name.clone()),
            });
        }
        let path = source
            .path
            .clone()
            .ok_or_else(|| ReclimitError::Validation("no source file given".into()))?;
        let format = detect_format(&path, self.format_hint)?;
        Ok(ResolvedSource {
            path,
            format,
            upload: None,
        })
    }
}

/// Layer command-line flags over the loaded configuration.
fn apply_cli_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(delimiter) = args.delimiter {
        config.file_loading.delimiter = Some(delimiter);
    }
    if let Some(sheet) = &args.excel_sheet {
        config.file_loading.excel_sheet = Some(sheet.clone());
    }
    if let Some(mode) = args.coercion_policy {
        config.engine.coercion_policy = match mode {
            CoercionMode::Row => "row".to_string(),
            CoercionMode::Column => "column".to_string(),
        };
    }
}

/// Cap from --max-rows, else from the request file, else unlimited.
fn resolve_cap(limit: &LimitArgs, request_cap: Option<RowCap>) -> Result<RowCap> {
    match &limit.max_rows {
        Some(text) => Ok(RowCap::parse(text)?),
        None => Ok(request_cap.unwrap_or_default()),
    }
}

fn read_request(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| eyre!(ReclimitError::Io(e)).wrap_err(format!("reading {}", path.display())))
}

fn filter_inputs(conditions: &[String], limit: &LimitArgs) -> Result<FilterRequest> {
    let mut request = match &limit.request {
        Some(path) => FilterRequest::from_json(&read_request(path)?)?,
        None => FilterRequest::default(),
    };
    request.conditions.extend(conditions_from_args(conditions)?);
    request.cap = resolve_cap(limit, Some(request.cap))?;
    Ok(request)
}

fn update_inputs(rules: &[String], limit: &LimitArgs) -> Result<UpdateRequest> {
    let mut request = match &limit.request {
        Some(path) => UpdateRequest::from_json(&read_request(path)?)?,
        None => UpdateRequest::default(),
    };
    request.rules.extend(rules_from_args(rules)?);
    request.cap = resolve_cap(limit, Some(request.cap))?;
    Ok(request)
}

fn render(terminal: &mut DefaultTerminal, form: &Form) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(form, frame.area()))?;
    Ok(())
}

fn run_form(mut terminal: DefaultTerminal, form: &mut Form) -> Result<()> {
    let (tx, rx) = channel::<AppEvent>();
    render(&mut terminal, form)?;

    loop {
        if crossterm::event::poll(std::time::Duration::from_millis(25))? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key) if key.kind == KeyEventKind::Press => {
                    tx.send(AppEvent::Key(key))?
                }
                crossterm::event::Event::Resize(..) => tx.send(AppEvent::Resize)?,
                _ => {}
            }
        }

        let updated = match rx.recv_timeout(std::time::Duration::from_millis(0)) {
            Ok(event) => {
                match event {
                    AppEvent::Exit => break,
                    AppEvent::Key(key) => {
                        if let Some(FormEvent::Exit) = form.handle_key(key) {
                            tx.send(AppEvent::Exit)?;
                        }
                    }
                    AppEvent::Resize => {}
                }
                true
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => false,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if updated {
            render(&mut terminal, form)?;
        }
    }
    Ok(())
}

fn run_command(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Headers { source, json } => {
            let source = ctx.resolve(&source)?;
            let bytes = std::fs::read(&source.path).map_err(ReclimitError::Io)?;
            let headers = header_of(&bytes, source.format, &ctx.options)?;
            if json {
                println!("{}", serde_json::to_string(&headers)?);
            } else {
                for header in headers {
                    println!("{}", header);
                }
            }
        }
        Command::Upload { path } => {
            let bytes = std::fs::read(&path).map_err(ReclimitError::Io)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let receipt = ctx.store.put(&name, &bytes, &ctx.options)?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
        Command::Filter {
            source,
            conditions,
            limit,
            output,
        } => {
            let request = filter_inputs(&conditions, &limit)?;
            let source = ctx.resolve(&source)?;
            let table = load_path(&source.path, Some(source.format), &ctx.options)?;
            let result = ctx.engine.filter(&table, &request.conditions, request.cap);
            if result.is_empty() {
                warn!("no rows match the given filters; writing the header only");
            }
            let output =
                output.unwrap_or_else(|| source.output_path(OutputKind::Filtered, &ctx.store));
            save_path(&result, &output, source.format, &ctx.options)?;
            println!("Wrote {} row(s) to {}", result.num_rows(), output.display());
        }
        Command::Update {
            source,
            rules,
            limit,
            output,
        } => {
            let request = update_inputs(&rules, &limit)?;
            let source = ctx.resolve(&source)?;
            let table = load_path(&source.path, Some(source.format), &ctx.options)?;
            let result = ctx.engine.update(&table, &request.rules, request.cap);
            let output =
                output.unwrap_or_else(|| source.output_path(OutputKind::Updated, &ctx.store));
            save_path(&result, &output, source.format, &ctx.options)?;
            println!("Wrote {} row(s) to {}", result.num_rows(), output.display());
        }
        Command::Count {
            source,
            conditions,
            limit,
        } => {
            let request = filter_inputs(&conditions, &limit)?;
            let source = ctx.resolve(&source)?;
            let table = load_path(&source.path, Some(source.format), &ctx.options)?;
            let n = ctx.engine.count(&table, &request.conditions, request.cap);
            println!("Matching rows: {}", n);
        }
        Command::Form {
            source,
            update,
            output,
        } => {
            let source = ctx.resolve(&source)?;
            let table = load_path(&source.path, Some(source.format), &ctx.options)?;
            let mode = if update {
                FormMode::Update
            } else {
                FormMode::Filter
            };
            let output_dir = source
                .upload
                .as_ref()
                .map(|_| ctx.store.dir().to_path_buf());
            let mut form = Form::new(
                source.path.clone(),
                source.format,
                table,
                ctx.engine,
                ctx.config.limits.default_max_rows,
            )
            .with_mode(mode)
            .with_file_options(ctx.options.clone())
            .with_output(output)
            .with_output_dir(output_dir);

            let terminal = ratatui::init();
            let result = run_form(terminal, &mut form);
            ratatui::restore();
            result?;
            if let Some(status) = &form.status {
                println!("{}", status);
            }
        }
    }
    Ok(())
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        let config_manager = ConfigManager::new(APP_NAME)?;
        let path = config_manager.write_default_config(args.force)?;
        println!("Configuration file written to {}", path.display());
        return Ok(Some(()));
    }

    if args.clear_uploads {
        let config = AppConfig::load(APP_NAME)?;
        let store = config.upload_store(APP_NAME)?;
        store.clear_all()?;
        println!("Uploads cleared from {}", store.dir().display());
        return Ok(Some(()));
    }

    Ok(None)
}

fn run(args: Args) -> Result<()> {
    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    let Some(command) = args.command.clone() else {
        return Err(eyre!(ReclimitError::Validation(
            "no command given; run `reclimit --help` for usage".into()
        )));
    };

    let mut config = AppConfig::load(APP_NAME)?;
    apply_cli_overrides(&mut config, &args);
    config.validate()?;

    let interactive = matches!(command, Command::Form { .. });
    let env_directive = std::env::var("RUST_LOG").ok();
    let settings = LogSettings {
        directive: logging::resolve_directive(
            args.log_level.as_deref(),
            env_directive.as_deref(),
            &config.logging.level,
        ),
        stderr: !interactive,
        file: interactive || args.log_file || config.logging.log_to_file,
    };
    logging::init(APP_NAME, &settings)?;
    info!(command = ?command, "starting");

    let ctx = Context::new(config, args.format)?;
    run_command(&ctx, command)
}

/// Exit status for a failed run: 2 for bad input, 1 for everything else.
fn exit_code(report: &color_eyre::eyre::Report) -> i32 {
    report
        .chain()
        .find_map(|cause| cause.downcast_ref::<ReclimitError>())
        .map(|err| match err.kind() {
            ErrorKind::Validation => 2,
            ErrorKind::Io => 1,
        })
        .unwrap_or(1)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    if let Err(report) = run(args) {
        eprintln!("Error: {}", user_message_from_report(&report, None));
        std::process::exit(exit_code(&report));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reclimit::CoercionPolicy;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::try_parse_from([
            "reclimit",
            "count",
            "data.csv",
            "--delimiter",
            ";",
            "--coercion-policy",
            "column",
        ])
        .unwrap();
        let mut config = AppConfig::default();
        apply_cli_overrides(&mut config, &args);
        assert_eq!(config.file_options().delimiter, b';');
        assert_eq!(
            config.coercion_policy().unwrap(),
            CoercionPolicy::ColumnScoped
        );
    }

    #[test]
    fn test_resolve_cap_prefers_flag() {
        let limit = LimitArgs {
            max_rows: Some("3".into()),
            request: None,
        };
        let request_cap = RowCap::new(10).unwrap();
        assert_eq!(
            resolve_cap(&limit, Some(request_cap)).unwrap().limit(),
            Some(3)
        );
        let limit = LimitArgs {
            max_rows: None,
            request: None,
        };
        assert_eq!(
            resolve_cap(&limit, Some(request_cap)).unwrap().limit(),
            Some(10)
        );
        let limit = LimitArgs {
            max_rows: Some("0".into()),
            request: None,
        };
        assert!(resolve_cap(&limit, None).is_err());
    }

    #[test]
    fn test_exit_codes() {
        let report = eyre!(ReclimitError::Validation("bad cap".into()));
        assert_eq!(exit_code(&report), 2);
        let report = eyre!(ReclimitError::UploadNotFound("a.csv".into()));
        assert_eq!(exit_code(&report), 1);
        assert_eq!(exit_code(&eyre!("something else")), 1);
    }

    #[test]
    fn test_filter_inputs_merges_request_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("req.json");
        std::fs::write(
            &path,
            r#"{"filters": [["age", ">", "26"]], "max_records": 5}"#,
        )
        .unwrap();
        let limit = LimitArgs {
            max_rows: None,
            request: Some(path),
        };
        let args = vec!["name".to_string(), "contains".to_string(), "a".to_string()];
        let request = filter_inputs(&args, &limit).unwrap();
        assert_eq!(request.conditions.len(), 2);
        assert_eq!(request.cap.limit(), Some(5));
    }
}
