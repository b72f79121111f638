#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(err) = native::run() {
        eprintln!("quad_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use quadfield_engine::geom::{ExtractOptions, PositionSolver, QuadMesh, extract_quad_mesh};
    use quadfield_engine::parse::parse_field_obj;
    use std::fs::{self, File};
    use std::io::{self, BufWriter, Write};
    use std::path::{Path, PathBuf};

    const USAGE: &str = r#"quad_cli (quadfield-engine)

USAGE:
  quad_cli <input.obj> [options]

The input is a triangle OBJ with one `vq` (orientation) and one `vo`
(position field) record per vertex, and an optional `scale s` record.

OPTIONS:
  -o, --out <path>   Write the quad OBJ here (default: stdout)
  --seed <n>         Seed for residual flow edits (default 0)
  --radius <n>       Largest flip repair edit radius (default 1)
  --levels <n>       Flow hierarchy levels (default 8)
  --jacobi           Use weighted Jacobi instead of conjugate gradient
  --no-holes         Skip hole patching
  --overwrite        Overwrite an existing output file
  -h, --help         Show this help

Set RUST_LOG=debug for per-stage counts.
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let mut input: Option<PathBuf> = None;
        let mut output: Option<PathBuf> = None;
        let mut options = ExtractOptions::new();
        let mut overwrite = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-o" | "--out" => output = Some(PathBuf::from(args.value(&arg)?)),
                "--seed" => options = options.with_seed(parse_number(&args.value("--seed")?, "--seed")?),
                "--radius" => {
                    options = options.with_max_edit_radius(parse_number(&args.value("--radius")?, "--radius")?);
                }
                "--levels" => {
                    options = options.with_flow_levels(parse_number(&args.value("--levels")?, "--levels")?);
                }
                "--jacobi" => options = options.with_position_solver(PositionSolver::jacobi()),
                "--no-holes" => options = options.with_patch_holes(false),
                "--overwrite" => overwrite = true,
                "-h" | "--help" => {
                    println!("{USAGE}");
                    return Ok(());
                }
                other if other.starts_with('-') => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
                other => {
                    if input.is_some() {
                        return Err(format!("unexpected argument `{other}`\n\n{USAGE}"));
                    }
                    input = Some(PathBuf::from(other));
                }
            }
        }

        let Some(input) = input else {
            return Err(format!("missing input file\n\n{USAGE}"));
        };

        let text = fs::read_to_string(&input).map_err(|e| format!("read {}: {e}", input.display()))?;
        let field = parse_field_obj(&text).map_err(|e| format!("parse {}: {e}", input.display()))?;
        log::info!(
            "loaded {}: {} vertices, {} faces, scale {}",
            input.display(),
            field.vertex_count(),
            field.face_count(),
            field.scale
        );

        let extraction = extract_quad_mesh(&field, options).map_err(|e| format!("extract: {e}"))?;
        let mesh = extraction.mesh.export_dense();

        match output {
            Some(path) => write_obj_file(&path, &mesh, overwrite)?,
            None => {
                let stdout = io::stdout();
                write_obj(&mut stdout.lock(), &mesh)?;
            }
        }

        eprintln!("{}", extraction.diagnostics.summary());
        if extraction.diagnostics.has_warnings() {
            for warning in &extraction.diagnostics.warnings {
                log::warn!("{warning}");
            }
        }
        Ok(())
    }

    fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> Result<T, String>
    where
        T::Err: std::fmt::Display,
    {
        value
            .parse::<T>()
            .map_err(|e| format!("invalid value `{value}` for {flag}: {e}"))
    }

    fn write_obj_file(path: &Path, mesh: &QuadMesh, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }

        let file = File::create(path).map_err(|e| format!("create {}: {e}", path.display()))?;
        let mut w = BufWriter::new(file);
        write_obj(&mut w, mesh)?;
        w.flush().map_err(|e| format!("write obj: {e}"))
    }

    fn write_obj<W: Write>(w: &mut W, mesh: &QuadMesh) -> Result<(), String> {
        writeln!(w, "# quadfield-engine quad_cli").map_err(|e| format!("write obj: {e}"))?;
        mesh.write_obj(w).map_err(|e| format!("write obj: {e}"))
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next()
                .ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
