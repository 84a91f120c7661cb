fn main() {
    if let Err(err) = native::run() {
        eprintln!("mesh_cli error: {err}");
        std::process::exit(1);
    }
}

mod native {
    use std::f64::consts::FRAC_PI_2;
    use std::fmt::Write as _;
    use std::fs::{self, File};
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use brep_mesher::geom::{BBox, CylinderSurface, Interval, PlaneSurface, Point3, Surface, UvBoundary, UvPoint, Vec3};
    use brep_mesher::mesh::{MeshModel, MeshReport, MeshSummary, Mesher, MesherConfig};
    use brep_mesher::topo::{FaceId, StatusFlags, TopoArena, TopologicalEntity};

    const SNAPSHOT_QUANTIZE: f64 = 1e-6;
    const SNAPSHOT_DECIMALS: usize = 6;

    const USAGE: &str = r#"mesh_cli (brep-mesher)

USAGE:
  mesh_cli list
  mesh_cli run <scenario|all> [options]

SCENARIOS:
  square_with_hole
  two_squares_joined
  thin_rib
  cylinder_patch

OPTIONS (run):
  --out-dir <dir>    Write <scenario>.obj and <scenario>.snap to this dir (required for `all`)
  --obj <path>       Write OBJ (single scenario only)
  --snap <path>      Write snapshot (single scenario only)
  --config <path>    Mesher configuration as JSON
  --overwrite        Overwrite existing output files
  -v, --verbose      Log to stderr
  -h, --help         Show this help
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                print_scenarios();
                Ok(())
            }
            "run" => cmd_run(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn print_scenarios() {
        for scenario in Scenario::ALL {
            println!("{}", scenario.name());
        }
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let scenario_name = args.next().ok_or("missing scenario name")?;

        let mut out_dir: Option<PathBuf> = None;
        let mut obj_path: Option<PathBuf> = None;
        let mut snap_path: Option<PathBuf> = None;
        let mut config_path: Option<PathBuf> = None;
        let mut overwrite = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--out-dir" => out_dir = Some(PathBuf::from(args.value("--out-dir")?)),
                "--obj" => obj_path = Some(PathBuf::from(args.value("--obj")?)),
                "--snap" => snap_path = Some(PathBuf::from(args.value("--snap")?)),
                "--config" => config_path = Some(PathBuf::from(args.value("--config")?)),
                "--overwrite" => overwrite = true,
                "-v" | "--verbose" => init_logger(),
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let config = match config_path {
            Some(path) => read_config(&path)?,
            None => None,
        };

        if let Some(dir) = out_dir.as_ref() {
            if obj_path.is_some() || snap_path.is_some() {
                return Err("use either --out-dir or --obj/--snap (not both)".to_string());
            }
            fs::create_dir_all(dir).map_err(|e| format!("create out dir: {e}"))?;

            if scenario_name == "all" {
                for scenario in Scenario::ALL {
                    run_one_scenario_to_dir(*scenario, config.as_ref(), dir, overwrite)?;
                }
                return Ok(());
            }

            let scenario = Scenario::from_str(scenario_name.as_str())
                .ok_or_else(|| unknown_scenario(&scenario_name))?;
            return run_one_scenario_to_dir(scenario, config.as_ref(), dir, overwrite);
        }

        if scenario_name == "all" {
            return Err("`run all` requires --out-dir".to_string());
        }

        let scenario =
            Scenario::from_str(scenario_name.as_str()).ok_or_else(|| unknown_scenario(&scenario_name))?;
        let output = run_scenario(scenario, config.as_ref())?;

        if let Some(path) = snap_path.as_deref() {
            write_text_file(path, &output.snapshot, overwrite)?;
            eprintln!("wrote {}", path.display());
        } else {
            print!("{}", output.snapshot);
        }

        if let Some(path) = obj_path.as_deref() {
            write_obj_file(path, &output.mesh, output.name, overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        print_summary(&output)
    }

    fn run_one_scenario_to_dir(
        scenario: Scenario,
        config: Option<&MesherConfig>,
        dir: &Path,
        overwrite: bool,
    ) -> Result<(), String> {
        let output = run_scenario(scenario, config)?;

        let path = dir.join(format!("{}.snap", output.name));
        write_text_file(&path, &output.snapshot, overwrite)?;
        eprintln!("wrote {}", path.display());

        let path = dir.join(format!("{}.obj", output.name));
        write_obj_file(&path, &output.mesh, output.name, overwrite)?;
        eprintln!("wrote {}", path.display());

        print_summary(&output)
    }

    fn print_summary(output: &ScenarioOutput) -> Result<(), String> {
        let summary = serde_json::to_string(&output.summary).map_err(|e| format!("summary: {e}"))?;
        eprintln!("{}: {summary}", output.name);
        Ok(())
    }

    fn read_config(path: &Path) -> Result<Option<MesherConfig>, String> {
        let text = fs::read_to_string(path).map_err(|e| format!("read {}: {e}", path.display()))?;
        let config: MesherConfig =
            serde_json::from_str(&text).map_err(|e| format!("parse {}: {e}", path.display()))?;
        config.validate().map_err(|e| format!("{}: {e}", path.display()))?;
        Ok(Some(config))
    }

    fn unknown_scenario(name: &str) -> String {
        let mut msg = String::new();
        let _ = writeln!(msg, "unknown scenario `{name}`\n\navailable scenarios:");
        for scenario in Scenario::ALL {
            let _ = writeln!(msg, "  {}", scenario.name());
        }
        msg
    }

    // ── logging ─────────────────────────────────────────────────────────────

    struct StderrLogger;

    impl log::Log for StderrLogger {
        fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &log::Record<'_>) {
            if self.enabled(record.metadata()) {
                eprintln!("[{} {}] {}", record.level(), record.target(), record.args());
            }
        }

        fn flush(&self) {}
    }

    static LOGGER: StderrLogger = StderrLogger;

    fn init_logger() {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Debug);
        }
    }

    // ── output ──────────────────────────────────────────────────────────────

    /// Triangles of every meshed face, indices into `positions`.
    struct ObjMesh {
        positions: Vec<Point3>,
        normals: Vec<Vec3>,
        triangles: Vec<[usize; 3]>,
    }

    impl ObjMesh {
        fn from_model(model: &MeshModel) -> Self {
            let pool = model.coordinates();
            let triangles = model.face_meshes().into_iter().flat_map(|m| m.triangles).collect();
            Self { positions: pool.points, normals: pool.normals, triangles }
        }
    }

    fn write_text_file(path: &Path, text: &str, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        fs::write(path, normalize_snapshot_text(text)).map_err(|e| format!("write {}: {e}", path.display()))
    }

    fn write_obj_file(path: &Path, mesh: &ObjMesh, name: &str, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }

        let file = File::create(path).map_err(|e| format!("create {}: {e}", path.display()))?;
        let mut w = BufWriter::new(file);
        let err = |e: std::io::Error| format!("write obj: {e}");

        writeln!(w, "# brep-mesher mesh_cli").map_err(err)?;
        writeln!(w, "o {name}").map_err(err)?;
        for p in &mesh.positions {
            writeln!(w, "v {} {} {}", p.x, p.y, p.z).map_err(err)?;
        }
        for n in &mesh.normals {
            writeln!(w, "vn {} {} {}", n.x, n.y, n.z).map_err(err)?;
        }
        for [a, b, c] in &mesh.triangles {
            let (a, b, c) = (a + 1, b + 1, c + 1);
            writeln!(w, "f {a}//{a} {b}//{b} {c}//{c}").map_err(err)?;
        }

        w.flush().map_err(|e| format!("flush {}: {e}", path.display()))
    }

    fn normalize_snapshot_text(text: &str) -> String {
        let normalized = text.replace("\r\n", "\n");
        if normalized.ends_with('\n') {
            normalized
        } else {
            format!("{normalized}\n")
        }
    }

    fn quantize_f64(value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let q = (value / SNAPSHOT_QUANTIZE).round() * SNAPSHOT_QUANTIZE;
        if q == 0.0 { 0.0 } else { q }
    }

    fn write_f64(out: &mut String, value: f64) {
        let value = quantize_f64(value);
        let _ = write!(out, "{value:.SNAPSHOT_DECIMALS$}");
    }

    fn snapshot(name: &str, arena: &TopoArena, report: &MeshReport, mesh: &ObjMesh) -> String {
        let mut out = String::new();
        let diag = &report.diagnostics;
        let _ = writeln!(out, "scenario {name}");
        let _ = writeln!(out, "join.merged_vertices {}", report.join.merged_vertices);
        let _ = writeln!(out, "join.linked_edges {}", report.join.linked_edges);
        let _ = writeln!(out, "mesh.faces {}", report.meshed_faces.len());
        let _ = writeln!(out, "mesh.failures {}", report.failures.len());
        for (idx, failure) in report.failures.iter().enumerate() {
            let _ = writeln!(out, "mesh.failure.{idx} {failure}");
        }
        let _ = writeln!(out, "mesh_diag.vertex_count {}", diag.vertex_count);
        let _ = writeln!(out, "mesh_diag.triangle_count {}", diag.triangle_count);
        let _ = writeln!(out, "mesh_diag.boundary_edge_count {}", diag.boundary_edge_count);
        let _ = writeln!(out, "mesh_diag.non_manifold_edge_count {}", diag.non_manifold_edge_count);
        let _ = writeln!(out, "mesh_diag.rejected_segments {}", diag.rejected_segments);
        let _ = writeln!(out, "mesh_diag.abandoned_cycles {}", diag.abandoned_cycles);
        let _ = writeln!(out, "mesh_diag.degenerate_triangles {}", diag.degenerate_triangles);
        let _ = writeln!(out, "mesh_diag.warning_count {}", diag.warnings.len());
        for (idx, warning) in diag.warnings.iter().enumerate() {
            let _ = writeln!(out, "mesh_diag.warning.{idx} {warning}");
        }

        let thin = arena
            .edges()
            .iter()
            .filter(|e| e.status().contains(StatusFlags::THIN_ZONE))
            .count();
        let _ = writeln!(out, "topo.thin_zone_edges {thin}");

        let bbox = report.meshed_faces.iter().filter_map(|f| arena.face(*f).bbox(arena)).reduce(BBox::union);
        let _ = write!(out, "topo.bbox_diagonal ");
        write_f64(&mut out, bbox.map_or(0.0, BBox::diagonal));
        out.push('\n');

        let _ = write!(out, "mesh.area ");
        write_f64(&mut out, mesh_area(mesh));
        out.push('\n');
        out
    }

    fn mesh_area(mesh: &ObjMesh) -> f64 {
        mesh.triangles
            .iter()
            .map(|[a, b, c]| {
                let (pa, pb, pc) = (mesh.positions[*a], mesh.positions[*b], mesh.positions[*c]);
                0.5 * (pb - pa).cross(pc - pa).length()
            })
            .sum()
    }

    // ── scenarios ───────────────────────────────────────────────────────────

    #[derive(Clone, Copy)]
    enum Scenario {
        SquareWithHole,
        TwoSquaresJoined,
        ThinRib,
        CylinderPatch,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[
            Scenario::SquareWithHole,
            Scenario::TwoSquaresJoined,
            Scenario::ThinRib,
            Scenario::CylinderPatch,
        ];

        fn name(self) -> &'static str {
            match self {
                Scenario::SquareWithHole => "square_with_hole",
                Scenario::TwoSquaresJoined => "two_squares_joined",
                Scenario::ThinRib => "thin_rib",
                Scenario::CylinderPatch => "cylinder_patch",
            }
        }

        fn from_str(name: &str) -> Option<Self> {
            match name {
                "square_with_hole" => Some(Scenario::SquareWithHole),
                "two_squares_joined" => Some(Scenario::TwoSquaresJoined),
                "thin_rib" => Some(Scenario::ThinRib),
                "cylinder_patch" => Some(Scenario::CylinderPatch),
                _ => None,
            }
        }

        fn default_config(self) -> MesherConfig {
            match self {
                Scenario::SquareWithHole | Scenario::TwoSquaresJoined | Scenario::ThinRib => {
                    MesherConfig::default().with_max_edge_length(0.25)
                }
                Scenario::CylinderPatch => MesherConfig::default().with_max_edge_length(0.5),
            }
        }

        fn build(self, arena: &mut TopoArena) -> Result<Vec<FaceId>, String> {
            let faces = match self {
                Scenario::SquareWithHole => {
                    let hole = rect(0.4, 0.4, 0.6, 0.6).to_vec();
                    vec![arena.make_planar_polygon_face(plane(), &rect(0.0, 0.0, 1.0, 1.0), &[hole])]
                }
                Scenario::TwoSquaresJoined => vec![
                    arena.make_planar_polygon_face(plane(), &rect(0.0, 0.0, 1.0, 1.0), &[]),
                    arena.make_planar_polygon_face(plane(), &rect(1.0, 0.0, 2.0, 1.0), &[]),
                ],
                Scenario::ThinRib => {
                    let outline = [
                        UvPoint::new(0.0, 0.0),
                        UvPoint::new(1.0, 0.0),
                        UvPoint::new(1.0, 0.02),
                        UvPoint::new(0.0, 0.02),
                    ];
                    vec![arena.make_planar_polygon_face(plane(), &outline, &[])]
                }
                Scenario::CylinderPatch => {
                    let boundary = UvBoundary::new(Interval::new(0.0, FRAC_PI_2), Interval::new(0.0, 1.0));
                    let cylinder: Arc<dyn Surface> = Arc::new(
                        CylinderSurface::new(Point3::ORIGIN, Vec3::Z, Vec3::X, 2.0, boundary)
                            .ok_or("degenerate cylinder")?,
                    );
                    vec![arena.make_planar_polygon_face(cylinder, &rect(0.0, 0.0, FRAC_PI_2, 1.0), &[])]
                }
            };
            faces.into_iter().collect::<Result<Vec<_>, _>>().map_err(|e| e.to_string())
        }
    }

    fn plane() -> Arc<dyn Surface> {
        Arc::new(PlaneSurface::xy(0.0, UvBoundary::new(Interval::new(-1.0, 3.0), Interval::new(-1.0, 3.0))))
    }

    fn rect(u0: f64, v0: f64, u1: f64, v1: f64) -> [UvPoint; 4] {
        [UvPoint::new(u0, v0), UvPoint::new(u1, v0), UvPoint::new(u1, v1), UvPoint::new(u0, v1)]
    }

    struct ScenarioOutput {
        name: &'static str,
        mesh: ObjMesh,
        summary: MeshSummary,
        snapshot: String,
    }

    fn run_scenario(scenario: Scenario, config: Option<&MesherConfig>) -> Result<ScenarioOutput, String> {
        let config = config.cloned().unwrap_or_else(|| scenario.default_config());
        let mut arena = TopoArena::new(config.tolerance());
        let faces = scenario.build(&mut arena)?;

        let model = MeshModel::new();
        let report = Mesher::new(config).mesh_faces(&mut arena, &model, &faces).map_err(|e| e.to_string())?;
        if let Some(timing) = report.timing.as_ref() {
            log::info!("{}: meshed in {:.3} ms", scenario.name(), timing.total_ms());
        }

        let mesh = ObjMesh::from_model(&model);
        let snapshot = snapshot(scenario.name(), &arena, &report, &mesh);
        Ok(ScenarioOutput { name: scenario.name(), mesh, summary: MeshSummary::from(&report), snapshot })
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
            self.next().ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
