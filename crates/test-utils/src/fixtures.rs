//! Synthetic R2D2 runs for tests.
//!
//! [`SyntheticRun`] writes a run directory in the exact on-disk layout of the
//! simulation: parameter table, step counters, background record, rank grid,
//! decomposition tables and, on request, per-step products. Stored values
//! come from [`crate::generators`] so tests can check any cell directly.

use std::f64::consts::PI;
use std::fs::{self, File};
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use bytes::BufMut;
use ndarray::{Array1, Array2};
use ndarray_npy::NpzWriter;

use crate::generators::{
    background_value, eos_log_dprdro, eos_log_value, field_value, on_the_fly_value, slice_value,
    step_time, tau_value, uniform_centers,
};

/// Primary variable names in storage order.
pub const PRIMARY_NAMES: [&str; 9] = ["ro", "vx", "vy", "vz", "bx", "by", "bz", "se", "ph"];

/// On-the-fly quantities written per group, in catalogue order.
pub const ON_THE_FLY_XY: [&str; 2] = ["ro_xy", "vx_xy"];
pub const ON_THE_FLY_XZ: [&str; 1] = ["se_xz"];
pub const ON_THE_FLY_FLUX: [&str; 1] = ["fe_flux"];
pub const ON_THE_FLY_SPEX: [&str; 1] = ["ke_spex"];

/// Axes of the synthetic EOS table.
pub const EOS_LOG_RO_RANGE: (f64, f64) = (-20.0, 0.0);
pub const EOS_SE_RANGE: (f64, f64) = (0.0, 4.0);
const EOS_NODES: (usize, usize) = (21, 9);

/// Workers per bucket directory in the bucketed fragment layout.
const BUCKET_SIZE: usize = 1000;

/// Description of a synthetic run.
///
/// Ghost cells are enabled on all three axes (`xdcheck = ydcheck = zdcheck
/// = 2`), so every axis carries `margin` ghosts per side.
#[derive(Debug, Clone)]
pub struct SyntheticRun {
    /// Case name; the run directory is `<root>/<case>`.
    pub case: String,
    pub geometry: &'static str,
    pub ix0: usize,
    pub jx0: usize,
    pub kx0: usize,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub margin: usize,
    pub mtype: usize,
    /// Worker grid of the remapped output.
    pub ixr: usize,
    pub jxr: usize,
    pub big_endian: bool,
    pub bucketed: bool,
    pub nd: u32,
    pub nd_tau: u32,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub z_range: (f64, f64),
    pub rstar: Option<f64>,
    pub m_tu: usize,
    pub m_in: usize,
    /// Positions of the arbitrary slices normal to x, y and z.
    pub slices: Option<[Vec<f64>; 3]>,
}

impl SyntheticRun {
    /// Cartesian run of `ix0 * nx` by `jx0 * ny` by `kx0 * nz` cells, with an
    /// `ix0 x jx0` worker grid.
    pub fn cartesian(ix0: usize, jx0: usize, kx0: usize, nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            case: "d001".to_string(),
            geometry: "Cartesian",
            ix0,
            jx0,
            kx0,
            nx,
            ny,
            nz,
            margin: 1,
            mtype: 8,
            ixr: ix0,
            jxr: jx0,
            big_endian: false,
            bucketed: true,
            nd: 5,
            nd_tau: 5,
            x_range: (0.0, (ix0 * nx) as f64),
            y_range: (0.0, (jx0 * ny) as f64),
            z_range: (0.0, (kx0 * nz) as f64),
            rstar: None,
            m_tu: 3,
            m_in: 13,
            slices: None,
        }
    }

    /// Yin-Yang run whose patches have `ix0 * nx` by `jx0 * ny` by `kx0 * nz`
    /// cells. Fragments cover the merged grid with a single worker.
    pub fn yin_yang(ix0: usize, jx0: usize, kx0: usize, nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            case: "yy01".to_string(),
            geometry: "YinYang",
            ixr: 1,
            jxr: 1,
            x_range: (5.0e10, 6.9e10),
            y_range: (0.25 * PI, 0.75 * PI),
            z_range: (-0.75 * PI, 0.75 * PI),
            rstar: Some(6.957e10),
            ..Self::cartesian(ix0, jx0, kx0, nx, ny, nz)
        }
    }

    pub fn with_case(mut self, case: &str) -> Self {
        self.case = case.to_string();
        self
    }

    pub fn with_worker_grid(mut self, ixr: usize, jxr: usize) -> Self {
        self.ixr = ixr;
        self.jxr = jxr;
        self
    }

    pub fn with_mtype(mut self, mtype: usize) -> Self {
        self.mtype = mtype;
        self
    }

    pub fn with_margin(mut self, margin: usize) -> Self {
        self.margin = margin;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    /// Use the flat fragment layout instead of bucket directories.
    pub fn flat(mut self) -> Self {
        self.bucketed = false;
        self
    }

    pub fn with_steps(mut self, nd: u32, nd_tau: u32) -> Self {
        self.nd = nd;
        self.nd_tau = nd_tau;
        self
    }

    pub fn with_ranges(mut self, x: (f64, f64), y: (f64, f64), z: (f64, f64)) -> Self {
        self.x_range = x;
        self.y_range = y;
        self.z_range = z;
        self
    }

    pub fn with_slices(mut self, x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
        self.slices = Some([x, y, z]);
        self
    }

    pub fn is_yin_yang(&self) -> bool {
        self.geometry == "YinYang"
    }

    pub fn npe(&self) -> usize {
        self.ix0 * self.jx0 * self.kx0
    }

    /// Stored cell counts (per patch for Yin-Yang runs).
    pub fn ix(&self) -> usize {
        self.ix0 * self.nx
    }

    pub fn jx(&self) -> usize {
        self.jx0 * self.ny
    }

    pub fn kx(&self) -> usize {
        self.kx0 * self.nz
    }

    /// Cell counts of the grid the fragments cover.
    pub fn merged_shape(&self) -> (usize, usize, usize) {
        if self.is_yin_yang() {
            let jx = 2 * self.jx();
            (self.ix(), jx, 2 * jx)
        } else {
            (self.ix(), self.jx(), self.kx())
        }
    }

    /// Ghost-inclusive stored counts.
    pub fn ghost_shape(&self) -> (usize, usize, usize) {
        let g = 2 * self.margin;
        (self.ix() + g, self.jx() + g, self.kx() + g)
    }

    /// Ghost-inclusive cell centers per axis, as written to `back.dac`.
    pub fn coordinates(&self) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        (
            uniform_centers(self.x_range, self.ix(), self.margin),
            uniform_centers(self.y_range, self.jx(), self.margin),
            uniform_centers(self.z_range, self.kx(), self.margin),
        )
    }

    /// Active workers as `(rank, i range, j range, row, col)`, 0-based and
    /// half-open over the merged grid. Rank `row + ixr * col` sits at
    /// `(row, col)`.
    pub fn workers(&self) -> Vec<(usize, Range<usize>, Range<usize>, usize, usize)> {
        let (ix, jx, _) = self.merged_shape();
        (0..self.ixr * self.jxr)
            .map(|rank| {
                let (row, col) = (rank % self.ixr, rank / self.ixr);
                (rank, split(ix, self.ixr, row), split(jx, self.jxr, col), row, col)
            })
            .collect()
    }

    /// Write the run skeleton under `<root>/<case>` and return its data
    /// directory.
    pub fn write(&self, root: &Path) -> io::Result<PathBuf> {
        if self.ixr * self.jxr > self.npe() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{}x{} worker grid needs more than {} ranks",
                    self.ixr,
                    self.jxr,
                    self.npe()
                ),
            ));
        }

        let datadir = root.join(&self.case).join("data");
        for dir in ["param", "remap/qq", "time/mhd", "time/tau", "tau", "qq"] {
            fs::create_dir_all(datadir.join(dir))?;
        }
        if self.bucketed {
            fs::create_dir_all(datadir.join("remap/qq/00000"))?;
        }

        let param = datadir.join("param");
        fs::write(param.join("params.dac"), self.params_text())?;
        fs::write(param.join("nd.dac"), format!("{:8}{:8}\n", self.nd, self.nd_tau))?;
        fs::write(param.join("back.dac"), self.background_record())?;
        fs::write(param.join("xyz.dac"), self.rank_grid_record())?;
        fs::write(datadir.join("remap/remap_info.dac"), self.remap_info())?;

        if let Some([xs, ys, zs]) = &self.slices {
            let slice_dir = datadir.join("slice");
            fs::create_dir_all(&slice_dir)?;
            fs::write(
                slice_dir.join("params.dac"),
                format!(
                    "{} nx_slice i\n{} ny_slice i\n{} nz_slice i\n",
                    xs.len(),
                    ys.len(),
                    zs.len()
                ),
            )?;
            let mut buf = Vec::new();
            self.put_f64s(&mut buf, xs.iter().chain(ys).chain(zs).copied());
            fs::write(slice_dir.join("slice.dac"), buf)?;
        }

        Ok(datadir)
    }

    fn params_text(&self) -> String {
        let mut lines = vec![
            format!("{} geometry c", self.geometry),
            format!("{} margin i", self.margin),
            "2 xdcheck i".to_string(),
            "2 ydcheck i".to_string(),
            "2 zdcheck i".to_string(),
            format!("{} ix0 i", self.ix0),
            format!("{} jx0 i", self.jx0),
            format!("{} kx0 i", self.kx0),
            format!("{} nx i", self.nx),
            format!("{} ny i", self.ny),
            format!("{} nz i", self.nz),
            format!("{} npe i", self.npe()),
            format!("{} mtype i", self.mtype),
            format!("{} ixr i", self.ixr),
            format!("{} jxr i", self.jxr),
            format!("{} swap i", if self.big_endian { 1 } else { 0 }),
            format!("{} m_tu i", self.m_tu),
            format!("{} m_in i", self.m_in),
            format!("{:.16e} xmin d", self.x_range.0),
            format!("{:.16e} xmax d", self.x_range.1),
            format!("{:.16e} ymin d", self.y_range.0),
            format!("{:.16e} ymax d", self.y_range.1),
            format!("{:.16e} zmin d", self.z_range.0),
            format!("{:.16e} zmax d", self.z_range.1),
            "F ununiform_flag l".to_string(),
            "Synthetic server c".to_string(),
        ];
        if let Some(rstar) = self.rstar {
            lines.push(format!("{:.16e} rstar d", rstar));
        }
        lines.join("\n") + "\n"
    }

    fn background_record(&self) -> Vec<u8> {
        let (xg, yg, zg) = self.coordinates();
        let ixg = xg.len();
        let payload = 8 * (xg.len() + yg.len() + zg.len() + 20 * ixg);

        let mut buf = Vec::with_capacity(payload + 8);
        self.put_i32s(&mut buf, [payload as i32]);
        self.put_f64s(&mut buf, xg.iter().chain(&yg).chain(&zg).copied());
        for p in 0..20 {
            self.put_f64s(&mut buf, (0..ixg).map(|i| background_value(p, i)));
        }
        self.put_i32s(&mut buf, [payload as i32]);
        buf
    }

    fn rank_grid_record(&self) -> Vec<u8> {
        let npe = self.npe();
        let position = |p: usize, axis: usize| -> i32 {
            let v = match axis {
                0 => p % self.ix0,
                1 => (p / self.ix0) % self.jx0,
                _ => p / (self.ix0 * self.jx0),
            };
            v as i32
        };

        let mut buf = Vec::new();
        let marker = (npe * 3 * 4) as i32;
        self.put_i32s(&mut buf, [marker]);
        for axis in 0..3 {
            self.put_i32s(&mut buf, (0..npe).map(|p| position(p, axis)));
        }
        self.put_i32s(&mut buf, [marker]);
        buf
    }

    fn remap_info(&self) -> Vec<u8> {
        let npe = self.npe();
        let workers = self.workers();
        let (ixg, jxg, _) = self.ghost_shape();

        let mut iss = vec![0i32; npe];
        let mut iee = vec![0i32; npe];
        let mut jss = vec![0i32; npe];
        let mut jee = vec![0i32; npe];
        let mut iixl = vec![0i32; npe];
        let mut jjxl = vec![0i32; npe];
        let mut ir = vec![1i32; npe];
        let mut jr = vec![1i32; npe];
        for (rank, i, j, row, col) in &workers {
            iss[*rank] = i.start as i32 + 1;
            iee[*rank] = i.end as i32;
            jss[*rank] = j.start as i32 + 1;
            jee[*rank] = j.end as i32;
            iixl[*rank] = i.len() as i32;
            jjxl[*rank] = j.len() as i32;
            ir[*rank] = *row as i32 + 1;
            jr[*rank] = *col as i32 + 1;
        }

        let mut buf = Vec::new();
        for table in [&iss, &iee, &jss, &jee, &iixl, &jjxl] {
            self.put_i32s(&mut buf, table.iter().copied());
        }
        // (ixr, jxr) in Fortran order lists rank row + ixr * col
        self.put_i32s(&mut buf, (0..self.ixr * self.jxr).map(|r| r as i32));
        self.put_i32s(&mut buf, ir.iter().copied());
        self.put_i32s(&mut buf, jr.iter().copied());
        self.put_i32s(&mut buf, ownership(ixg, self.ix(), self.margin, self.ixr));
        self.put_i32s(&mut buf, ownership(jxg, self.jx(), self.margin, self.jxr));
        buf
    }

    /// Path of the fragment of `rank` at `step`.
    pub fn fragment_path(&self, datadir: &Path, step: u32, rank: usize) -> PathBuf {
        let root = datadir.join("remap").join("qq");
        let name = format!("qq.dac.{:08}.{:08}", step, rank);
        if self.bucketed {
            root.join(format!("{:05}", rank / BUCKET_SIZE))
                .join(format!("{:08}", rank))
                .join(name)
        } else {
            root.join(name)
        }
    }

    /// Write every active worker's fragment of `step`, filled with
    /// [`field_value`] at global indices.
    pub fn write_fragments(&self, datadir: &Path, step: u32) -> io::Result<()> {
        let (_, _, kx) = self.merged_shape();
        for (rank, i, j, _, _) in self.workers() {
            let mut buf = Vec::with_capacity(i.len() * j.len() * kx * (self.mtype + 3) * 4);
            for slot in 0..self.mtype + 3 {
                for k in 0..kx {
                    for gj in j.clone() {
                        self.put_f32s(&mut buf, i.clone().map(|gi| field_value(slot, gi, gj, k, step)));
                    }
                }
            }
            let path = self.fragment_path(datadir, step, rank);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, buf)?;
        }
        Ok(())
    }

    /// Write `time/<series>/t.dac.<step>` holding [`step_time`].
    pub fn write_time(&self, datadir: &Path, series: &str, step: u32) -> io::Result<()> {
        let dir = datadir.join("time").join(series);
        fs::create_dir_all(&dir)?;
        let mut buf = Vec::new();
        self.put_f64s(&mut buf, [step_time(step)]);
        fs::write(dir.join(format!("t.dac.{:08}", step)), buf)
    }

    /// Fragments and the MHD time stamp of `step`.
    pub fn write_step(&self, datadir: &Path, step: u32) -> io::Result<()> {
        self.write_fragments(datadir, step)?;
        self.write_time(datadir, "mhd", step)
    }

    /// Write the restart snapshot `qq/qq.dac.<suffix>`, evaluating
    /// `f(m, x, y, z)` at the ghost-inclusive cell centers.
    pub fn write_checkpoint<F>(&self, datadir: &Path, suffix: &str, f: F) -> io::Result<PathBuf>
    where
        F: Fn(usize, f64, f64, f64) -> f64,
    {
        let (xg, yg, zg) = self.coordinates();
        let mut buf = Vec::with_capacity(xg.len() * yg.len() * zg.len() * self.mtype * 8);
        for m in 0..self.mtype {
            for &z in &zg {
                for &y in &yg {
                    self.put_f64s(&mut buf, xg.iter().map(|&x| f(m, x, y, z)));
                }
            }
        }
        let dir = datadir.join("qq");
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("qq.dac.{}", suffix));
        fs::write(&path, buf)?;
        Ok(path)
    }

    fn patches(&self) -> Vec<(&'static str, usize)> {
        if self.is_yin_yang() {
            vec![("_yin", 0), ("_yan", 1)]
        } else {
            vec![("", 0)]
        }
    }

    /// Write the optical-depth surfaces of `step` and their time stamp.
    pub fn write_tau(&self, datadir: &Path, step: u32) -> io::Result<()> {
        // surfaces are stored per patch, so the unmerged counts apply
        let (jx, kx) = (self.jx(), self.kx());
        for (suffix, patch) in self.patches() {
            let mut buf = Vec::with_capacity(self.m_tu * self.m_in * jx * kx * 4);
            for k in 0..kx {
                for j in 0..jx {
                    for q in 0..self.m_in {
                        self.put_f32s(
                            &mut buf,
                            (0..self.m_tu).map(|l| tau_value(step, patch, l, q, j, k)),
                        );
                    }
                }
            }
            fs::write(datadir.join("tau").join(format!("qq{}.dac.{:08}", suffix, step)), buf)?;
        }
        self.write_time(datadir, "tau", step)
    }

    /// Plane shape of slices normal to `axis` (`'x'`, `'y'` or `'z'`).
    pub fn slice_shape(&self, axis: char) -> (usize, usize) {
        let (ix, jx, kx) = self.merged_shape();
        match axis {
            'x' if self.is_yin_yang() => (self.jx() + 2 * self.margin, self.kx() + 2 * self.margin),
            'x' => (jx, kx),
            'y' => (ix, kx),
            _ => (ix, jx),
        }
    }

    /// Write slice number `index` normal to `axis` at `step`.
    pub fn write_slice(&self, datadir: &Path, axis: char, index: usize, step: u32) -> io::Result<()> {
        let (n1, n2) = self.slice_shape(axis);
        let dir = datadir.join("slice");
        fs::create_dir_all(&dir)?;
        for (suffix, patch) in self.patches() {
            let mut buf = Vec::with_capacity(n1 * n2 * (self.mtype + 2) * 4);
            for slot in 0..self.mtype + 2 {
                for b in 0..n2 {
                    self.put_f32s(&mut buf, (0..n1).map(|a| slice_value(step, patch, slot, a, b)));
                }
            }
            let name = format!("qq{}{}.dac.{:08}.{:08}", axis, suffix, step, index + 1);
            fs::write(dir.join(name), buf)?;
        }
        Ok(())
    }

    /// Write the on-the-fly catalogue and the diagnostics of `step`.
    pub fn write_on_the_fly(&self, datadir: &Path, step: u32) -> io::Result<()> {
        let (ix, jx, kx) = self.merged_shape();
        let dir = datadir.join("remap").join("vl");
        fs::create_dir_all(&dir)?;

        let mut groups: Vec<(&str, &[&str], (usize, usize))> = vec![
            ("vl_xy", &ON_THE_FLY_XY[..], (ix, jx)),
            ("vl_xz", &ON_THE_FLY_XZ[..], (ix, kx)),
            ("vl_flux", &ON_THE_FLY_FLUX[..], (ix + 1, jx)),
        ];
        if self.is_yin_yang() {
            groups.push(("vl_spex", &ON_THE_FLY_SPEX[..], (ix, kx / 4)));
        }

        let counts: Vec<String> = groups.iter().map(|(_, names, _)| names.len().to_string()).collect();
        let mut catalogue = counts.join(" ") + "\n";
        for (_, names, _) in &groups {
            for name in names.iter() {
                catalogue.push_str(name);
                catalogue.push('\n');
            }
        }
        fs::write(dir.join("c.dac"), catalogue)?;

        let mut q = 0;
        for (stem, names, (n1, n2)) in &groups {
            let mut buf = Vec::new();
            for _ in names.iter() {
                for b in 0..*n2 {
                    self.put_f32s(&mut buf, (0..*n1).map(|a| on_the_fly_value(step, q, a, b)));
                }
                q += 1;
            }
            fs::write(dir.join(format!("{}.dac.{:08}", stem, step)), buf)?;
        }
        Ok(())
    }

    /// Write `<run>/input_data/eos_table_sero.npz` from
    /// [`eos_log_value`], returning its path.
    pub fn write_eos(&self, datadir: &Path) -> io::Result<PathBuf> {
        let run_dir = datadir
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "datadir has no parent"))?;
        let dir = run_dir.join("input_data");
        fs::create_dir_all(&dir)?;
        let path = dir.join("eos_table_sero.npz");
        write_eos_archive(&path)?;
        Ok(path)
    }

    /// Write `cont_log.txt` naming `origin_case` as the source run.
    pub fn write_cont_log(&self, datadir: &Path, origin_case: &str) -> io::Result<()> {
        let text = format!(
            "The initial condition is generated by regridding.\n\
             This file describes the source of the initial condition.\n\
             \n\
             ### Original data ###\n\
             \n\
             Server: synthetic\n\
             Datadir: /work/runs/{}/data/\n\
             Output step: 3\n",
            origin_case
        );
        fs::write(datadir.join("cont_log.txt"), text)
    }

    fn put_f32s(&self, buf: &mut Vec<u8>, values: impl IntoIterator<Item = f32>) {
        for v in values {
            if self.big_endian {
                buf.put_f32(v)
            } else {
                buf.put_f32_le(v)
            }
        }
    }

    fn put_f64s(&self, buf: &mut Vec<u8>, values: impl IntoIterator<Item = f64>) {
        for v in values {
            if self.big_endian {
                buf.put_f64(v)
            } else {
                buf.put_f64_le(v)
            }
        }
    }

    fn put_i32s(&self, buf: &mut Vec<u8>, values: impl IntoIterator<Item = i32>) {
        for v in values {
            if self.big_endian {
                buf.put_i32(v)
            } else {
                buf.put_i32_le(v)
            }
        }
    }
}

/// Part `p` of `n` cells split into `parts` contiguous ranges.
fn split(n: usize, parts: usize, p: usize) -> Range<usize> {
    p * n / parts..(p + 1) * n / parts
}

/// 1-based owner of every ghost-inclusive index; ghosts take the owner of
/// the adjacent boundary cell.
fn ownership(ng: usize, n: usize, ghost: usize, parts: usize) -> Vec<i32> {
    (0..ng)
        .map(|g| {
            let i = g.saturating_sub(ghost).min(n.saturating_sub(1));
            let part = (0..parts).find(|&p| split(n, parts, p).contains(&i)).unwrap_or(0);
            part as i32 + 1
        })
        .collect()
}

/// Write an EOS archive whose tables follow [`eos_log_value`].
pub fn write_eos_archive(path: &Path) -> io::Result<()> {
    let log_ro = Array1::linspace(EOS_LOG_RO_RANGE.0, EOS_LOG_RO_RANGE.1, EOS_NODES.0);
    let se = Array1::linspace(EOS_SE_RANGE.0, EOS_SE_RANGE.1, EOS_NODES.1);
    let table = |f: &dyn Fn(f64, f64) -> f64| {
        Array2::from_shape_fn(EOS_NODES, |(i, j)| f(log_ro[i], se[j]).exp())
    };

    let npz_err = |e: ndarray_npy::WriteNpzError| io::Error::new(io::ErrorKind::Other, e.to_string());
    let mut npz = NpzWriter::new(File::create(path)?);
    npz.add_array("ro", &log_ro).map_err(npz_err)?;
    npz.add_array("se", &se).map_err(npz_err)?;
    for (q, name) in ["pr", "en", "te", "op"].iter().enumerate() {
        npz.add_array(*name, &table(&|r, s| eos_log_value(q, r, s)))
            .map_err(npz_err)?;
    }
    npz.add_array("dprdro", &table(&eos_log_dprdro)).map_err(npz_err)?;
    npz.finish().map_err(npz_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_covers_range() {
        assert_eq!(split(8, 2, 0), 0..4);
        assert_eq!(split(8, 2, 1), 4..8);
        assert_eq!(split(7, 3, 2), 4..7);
    }

    #[test]
    fn test_ownership_with_ghosts() {
        assert_eq!(ownership(10, 8, 1, 2), vec![1, 1, 1, 1, 1, 2, 2, 2, 2, 2]);
    }

    #[test]
    fn test_workers_layout() {
        let run = SyntheticRun::cartesian(2, 2, 1, 4, 4, 3);
        let workers = run.workers();
        assert_eq!(workers.len(), 4);
        assert_eq!(workers[1], (1, 4..8, 0..4, 1, 0));
        assert_eq!(workers[2], (2, 0..4, 4..8, 0, 1));
    }

    #[test]
    fn test_write_skeleton() {
        let tmp = tempfile::tempdir().unwrap();
        let run = SyntheticRun::cartesian(2, 2, 1, 4, 4, 3);
        let datadir = run.write(tmp.path()).unwrap();
        assert!(datadir.join("param/params.dac").is_file());
        assert!(datadir.join("remap/qq/00000").is_dir());
        assert!(!datadir.join("slice").exists());

        let nd = fs::read_to_string(datadir.join("param/nd.dac")).unwrap();
        assert_eq!(nd, "       5       5\n");

        // head + (10 + 10 + 5 + 20 * 10) f64 + tail
        let back = fs::read(datadir.join("param/back.dac")).unwrap();
        assert_eq!(back.len(), 8 + 8 * 225);
    }

    #[test]
    fn test_write_fragments_sizes() {
        let tmp = tempfile::tempdir().unwrap();
        let run = SyntheticRun::cartesian(2, 2, 1, 4, 4, 3).flat();
        let datadir = run.write(tmp.path()).unwrap();
        run.write_fragments(&datadir, 5).unwrap();
        let path = datadir.join("remap/qq/qq.dac.00000005.00000003");
        assert_eq!(fs::read(path).unwrap().len(), 4 * 4 * 3 * 11 * 4);
    }

    #[test]
    fn test_too_many_workers_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let run = SyntheticRun::cartesian(1, 1, 1, 4, 4, 3).with_worker_grid(2, 1);
        assert!(run.write(tmp.path()).is_err());
    }
}
