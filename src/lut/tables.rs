use crate::lut::{AOT_GRID, LutError, NAOT};
use crate::sat_bands::Satellite;
use std::path::Path;

/// Standard sea-level pressure [mb]. `tauray` and the other-gas constants
/// are referenced to it.
pub const PRES_REF: f64 = 1013.25;

/// Raw contents of a legacy table file, before shape validation. Fields are
/// public so scene loaders and tests can assemble tables directly.
#[derive(Debug, Clone, Default)]
pub struct LegacyTableParts {
    pub nbands: usize,
    /// Pressure grid [mb], strictly increasing.
    pub tpres: Vec<f64>,
    /// View-zenith grid [deg], strictly increasing.
    pub ttv: Vec<f64>,
    /// Per view row: valid solar-zenith span, node count and offset of the
    /// row start in the packed solar axis.
    pub tsmin: Vec<f64>,
    pub tsmax: Vec<f64>,
    pub nbfi: Vec<usize>,
    pub nbfic: Vec<usize>,
    /// Packed solar-zenith node values [deg], row after row.
    pub tts: Vec<f64>,
    /// Intrinsic atmospheric reflectance, `[band][pres][aot][packed solar]`.
    pub rolutt: Vec<f64>,
    /// One-way transmittance, `[band][pres][aot][view angle]`.
    pub transt: Vec<f64>,
    /// Spherical albedo, `[band][pres][aot]`.
    pub sphalbt: Vec<f64>,
    /// Normalised extinction, `[band][pres][aot]`.
    pub normext: Vec<f64>,
    /// Rayleigh optical thickness per band at `PRES_REF`.
    pub tauray: Vec<f64>,
    // Gaseous transmittance constants, per band.
    pub ogtransa1: Vec<f64>,
    pub ogtransb0: Vec<f64>,
    pub ogtransb1: Vec<f64>,
    pub wvtransa: Vec<f64>,
    pub wvtransb: Vec<f64>,
    pub oztransa: Vec<f64>,
}

/// The traditional radiative-transfer tables for one scene, immutable after
/// load. All lookups clamp out-of-range pressure and angle arguments to the
/// table bounds; only non-finite (or negative AOT) arguments are errors.
#[derive(Debug, Clone)]
pub struct LegacyLutTables {
    nbands: usize,
    npres: usize,
    nview: usize,
    nsolar: usize,
    tpres: Vec<f64>,
    ttv: Vec<f64>,
    tsmin: Vec<f64>,
    tsmax: Vec<f64>,
    nbfi: Vec<usize>,
    nbfic: Vec<usize>,
    tts: Vec<f64>,
    rolutt: Vec<f64>,
    transt: Vec<f64>,
    sphalbt: Vec<f64>,
    normext: Vec<f64>,
    tauray: Vec<f64>,
    ogtransa1: Vec<f64>,
    ogtransb0: Vec<f64>,
    ogtransb1: Vec<f64>,
    wvtransa: Vec<f64>,
    wvtransb: Vec<f64>,
    oztransa: Vec<f64>,
}

/// Fortran-style bracketing on an increasing grid: index of the lower node
/// and the fractional distance towards the upper one. Arguments outside the
/// grid clamp to the first or last interval.
fn bracket(grid: &[f64], x: f64) -> (usize, f64) {
    let last = grid.len() - 1;
    if x <= grid[0] {
        return (0, 0.0);
    }
    if x >= grid[last] {
        return (last - 1, 1.0);
    }

    let mut idx = 0;
    for i in 0..last {
        if x >= grid[i] && x < grid[i + 1] {
            idx = i;
            break;
        }
    }
    let r = (x - grid[idx]) / (grid[idx + 1] - grid[idx]);
    (idx, r)
}

fn check_finite(what: &'static str, value: f64) -> Result<(), LutError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(LutError::Range { what, value })
    }
}

fn check_increasing(what: &'static str, grid: &[f64]) -> Result<(), LutError> {
    if grid.len() < 2 {
        return Err(LutError::MissingNode {
            table: what,
            expected: 2,
            found: grid.len(),
        });
    }
    for w in grid.windows(2) {
        if w[0] >= w[1] {
            return Err(LutError::Range {
                what,
                value: w[1],
            });
        }
    }
    Ok(())
}

fn check_len(table: &'static str, data: &[f64], expected: usize) -> Result<(), LutError> {
    if data.len() != expected {
        return Err(LutError::MissingNode {
            table,
            expected,
            found: data.len(),
        });
    }
    Ok(())
}

impl LegacyLutTables {
    pub fn from_parts(parts: LegacyTableParts) -> Result<Self, LutError> {
        let nbands = parts.nbands;
        check_increasing("tpres", &parts.tpres)?;
        check_increasing("ttv", &parts.ttv)?;
        let npres = parts.tpres.len();
        let nview = parts.ttv.len();

        for (name, len) in [
            ("tsmin", parts.tsmin.len()),
            ("tsmax", parts.tsmax.len()),
            ("nbfi", parts.nbfi.len()),
            ("nbfic", parts.nbfic.len()),
        ] {
            if len != nview {
                return Err(LutError::MissingNode {
                    table: name,
                    expected: nview,
                    found: len,
                });
            }
        }

        // The packed solar axis must tile exactly: row iv starts at
        // nbfic[iv] and holds nbfi[iv] increasing nodes.
        let mut offset = 0;
        for iv in 0..nview {
            if parts.nbfi[iv] < 2 {
                return Err(LutError::MissingNode {
                    table: "nbfi",
                    expected: 2,
                    found: parts.nbfi[iv],
                });
            }
            if parts.nbfic[iv] != offset {
                return Err(LutError::MissingNode {
                    table: "nbfic",
                    expected: offset,
                    found: parts.nbfic[iv],
                });
            }
            offset += parts.nbfi[iv];
        }
        let nsolar = offset;
        check_len("tts", &parts.tts, nsolar)?;
        for iv in 0..nview {
            check_increasing(
                "tts row",
                &parts.tts[parts.nbfic[iv]..parts.nbfic[iv] + parts.nbfi[iv]],
            )?;
        }

        check_len("rolutt", &parts.rolutt, nbands * npres * NAOT * nsolar)?;
        check_len("transt", &parts.transt, nbands * npres * NAOT * nview)?;
        check_len("sphalbt", &parts.sphalbt, nbands * npres * NAOT)?;
        check_len("normext", &parts.normext, nbands * npres * NAOT)?;
        for (name, data) in [
            ("tauray", &parts.tauray),
            ("ogtransa1", &parts.ogtransa1),
            ("ogtransb0", &parts.ogtransb0),
            ("ogtransb1", &parts.ogtransb1),
            ("wvtransa", &parts.wvtransa),
            ("wvtransb", &parts.wvtransb),
            ("oztransa", &parts.oztransa),
        ] {
            check_len(name, data, nbands)?;
        }

        Ok(Self {
            nbands,
            npres,
            nview,
            nsolar,
            tpres: parts.tpres,
            ttv: parts.ttv,
            tsmin: parts.tsmin,
            tsmax: parts.tsmax,
            nbfi: parts.nbfi,
            nbfic: parts.nbfic,
            tts: parts.tts,
            rolutt: parts.rolutt,
            transt: parts.transt,
            sphalbt: parts.sphalbt,
            normext: parts.normext,
            tauray: parts.tauray,
            ogtransa1: parts.ogtransa1,
            ogtransb0: parts.ogtransb0,
            ogtransb1: parts.ogtransb1,
            wvtransa: parts.wvtransa,
            wvtransb: parts.wvtransb,
            oztransa: parts.oztransa,
        })
    }

    /// Load the legacy table file for `satellite`, searching `aux_dir`
    /// recursively.
    pub fn find_and_load(aux_dir: &Path, satellite: Satellite) -> Result<Self, LutError> {
        let filename = format!("{}_aerosol_tables.txt", satellite.table_prefix());
        let path = super::locate_aux_file(aux_dir, &filename)?;
        Self::from_file(&path, satellite.num_bands())
    }

    /// Parse a legacy table file: `nbands npres nview nsolar`, the pressure
    /// grid, the four big tables, the angular tables, then the per-band
    /// constants. Token counts are cross-checked against the header.
    pub fn from_file(path: &Path, num_bands: usize) -> Result<Self, LutError> {
        let values = super::read_values(path)?;
        let mut cursor = Cursor::new(&values);

        let nbands = cursor.count("nbands")?;
        if nbands != num_bands {
            return Err(LutError::MissingNode {
                table: "nbands",
                expected: num_bands,
                found: nbands,
            });
        }
        let npres = cursor.count("npres")?;
        let nview = cursor.count("nview")?;
        let nsolar = cursor.count("nsolar")?;

        let parts = LegacyTableParts {
            nbands,
            tpres: cursor.take("tpres", npres)?,
            rolutt: cursor.take("rolutt", nbands * npres * NAOT * nsolar)?,
            transt: cursor.take("transt", nbands * npres * NAOT * nview)?,
            sphalbt: cursor.take("sphalbt", nbands * npres * NAOT)?,
            normext: cursor.take("normext", nbands * npres * NAOT)?,
            ttv: cursor.take("ttv", nview)?,
            tsmin: cursor.take("tsmin", nview)?,
            tsmax: cursor.take("tsmax", nview)?,
            nbfi: cursor.take_counts("nbfi", nview)?,
            nbfic: cursor.take_counts("nbfic", nview)?,
            tts: cursor.take("tts", nsolar)?,
            tauray: cursor.take("tauray", nbands)?,
            ogtransa1: cursor.take("ogtransa1", nbands)?,
            ogtransb0: cursor.take("ogtransb0", nbands)?,
            ogtransb1: cursor.take("ogtransb1", nbands)?,
            wvtransa: cursor.take("wvtransa", nbands)?,
            wvtransb: cursor.take("wvtransb", nbands)?,
            oztransa: cursor.take("oztransa", nbands)?,
        };

        Self::from_parts(parts)
    }

    pub fn num_bands(&self) -> usize {
        self.nbands
    }

    #[inline]
    fn rolutt_at(&self, band: usize, ip: usize, ia: usize, is: usize) -> f64 {
        self.rolutt[((band * self.npres + ip) * NAOT + ia) * self.nsolar + is]
    }

    #[inline]
    fn transt_at(&self, band: usize, ip: usize, ia: usize, iv: usize) -> f64 {
        self.transt[((band * self.npres + ip) * NAOT + ia) * self.nview + iv]
    }

    #[inline]
    fn sphalbt_at(&self, band: usize, ip: usize, ia: usize) -> f64 {
        self.sphalbt[(band * self.npres + ip) * NAOT + ia]
    }

    /// Normalised extinction at the reference slice: pressure layer 0,
    /// AOT index 3. Basis of the per-band spectral AOT scaling.
    pub fn normext_p0a3(&self, band: usize) -> f64 {
        self.normext[band * self.npres * NAOT + 3]
    }

    /// Rayleigh optical thickness for `band`, scaled to the surface
    /// pressure.
    pub fn tauray(&self, band: usize, pres_mb: f64) -> f64 {
        self.tauray[band] * pres_mb / PRES_REF
    }

    /// Intrinsic atmospheric (path) reflectance, interpolated multilinearly
    /// over pressure, AOT, view row and solar node. The solar axis is packed
    /// per view row; the solar zenith is clamped to the row's valid span.
    pub fn path_reflectance(
        &self,
        band: usize,
        pres_mb: f64,
        aot550: f64,
        solar_zen: f64,
        view_zen: f64,
    ) -> Result<f64, LutError> {
        check_finite("pressure", pres_mb)?;
        check_finite("solar zenith", solar_zen)?;
        check_finite("view zenith", view_zen)?;
        self.check_aot(aot550)?;

        let (ip, rp) = bracket(&self.tpres, pres_mb);
        let (ia, ra) = bracket(&AOT_GRID, aot550);
        let (iv, rv) = bracket(&self.ttv, view_zen);

        // Remove the solar, AOT and pressure dimensions within each of the
        // two bracketing view rows, then blend the rows.
        let mut row_vals = [0.0f64; 2];
        for (k, row) in [iv, (iv + 1).min(self.nview - 1)].into_iter().enumerate() {
            let start = self.nbfic[row];
            let nodes = &self.tts[start..start + self.nbfi[row]];
            let ts = solar_zen.clamp(self.tsmin[row], self.tsmax[row]);
            let (is, rs) = bracket(nodes, ts);

            let mut corner = [[0.0f64; 2]; 2]; // [pres][aot]
            for (i, p) in [ip, ip + 1].into_iter().enumerate() {
                for (j, a) in [ia, ia + 1].into_iter().enumerate() {
                    let lo = self.rolutt_at(band, p, a, start + is);
                    let hi = self.rolutt_at(band, p, a, start + is + 1);
                    corner[i][j] = (1.0 - rs) * lo + rs * hi;
                }
            }
            let at_lo = (1.0 - ra) * corner[0][0] + ra * corner[0][1];
            let at_hi = (1.0 - ra) * corner[1][0] + ra * corner[1][1];
            row_vals[k] = (1.0 - rp) * at_lo + rp * at_hi;
        }

        Ok((1.0 - rv) * row_vals[0] + rv * row_vals[1])
    }

    /// One-way atmospheric transmittance towards `zenith`, trilinear over
    /// pressure, AOT and the view-angle grid.
    pub fn transmission(
        &self,
        band: usize,
        pres_mb: f64,
        aot550: f64,
        zenith: f64,
    ) -> Result<f64, LutError> {
        check_finite("pressure", pres_mb)?;
        check_finite("zenith", zenith)?;
        self.check_aot(aot550)?;

        let (ip, rp) = bracket(&self.tpres, pres_mb);
        let (ia, ra) = bracket(&AOT_GRID, aot550);
        let (iv, rv) = bracket(&self.ttv, zenith);

        let mut at_pres = [0.0f64; 2];
        for (i, p) in [ip, ip + 1].into_iter().enumerate() {
            let mut at_aot = [0.0f64; 2];
            for (j, a) in [ia, ia + 1].into_iter().enumerate() {
                let lo = self.transt_at(band, p, a, iv);
                let hi = self.transt_at(band, p, a, iv + 1);
                at_aot[j] = (1.0 - rv) * lo + rv * hi;
            }
            at_pres[i] = (1.0 - ra) * at_aot[0] + ra * at_aot[1];
        }

        Ok((1.0 - rp) * at_pres[0] + rp * at_pres[1])
    }

    /// Atmospheric spherical albedo, bilinear over pressure and AOT.
    pub fn spherical_albedo(
        &self,
        band: usize,
        pres_mb: f64,
        aot550: f64,
    ) -> Result<f64, LutError> {
        check_finite("pressure", pres_mb)?;
        self.check_aot(aot550)?;

        let (ip, rp) = bracket(&self.tpres, pres_mb);
        let (ia, ra) = bracket(&AOT_GRID, aot550);

        let lo = (1.0 - ra) * self.sphalbt_at(band, ip, ia) + ra * self.sphalbt_at(band, ip, ia + 1);
        let hi = (1.0 - ra) * self.sphalbt_at(band, ip + 1, ia)
            + ra * self.sphalbt_at(band, ip + 1, ia + 1);
        Ok((1.0 - rp) * lo + rp * hi)
    }

    /// Ozone, water-vapour and other-gas transmittances along the two-way
    /// air mass `m`. Surface pressure in millibars, ozone in cm-atm, water
    /// vapour in g/cm^2.
    pub fn gaseous_transmittance(
        &self,
        band: usize,
        pres_mb: f64,
        air_mass: f64,
        uoz: f64,
        uwv: f64,
    ) -> (f64, f64, f64) {
        let p_atm = pres_mb / PRES_REF;
        let tgoz = (self.oztransa[band] * air_mass * uoz).exp();

        let x = air_mass * uwv;
        let tgwv = if x > 1.0e-6 {
            (-((self.wvtransa[band] + self.wvtransb[band] * x.ln()).exp())).exp()
        } else {
            1.0
        };

        let exponent = (self.ogtransb0[band] + self.ogtransb1[band] * p_atm).exp();
        let tgog = (-(self.ogtransa1[band] * p_atm) * air_mass.powf(exponent)).exp();

        (tgoz, tgwv, tgog)
    }

    fn check_aot(&self, aot550: f64) -> Result<(), LutError> {
        check_finite("aot550", aot550)?;
        if aot550 < 0.0 {
            return Err(LutError::Range {
                what: "aot550",
                value: aot550,
            });
        }
        Ok(())
    }
}

/// Sequential reader over the parsed token stream, reporting which table a
/// short read happened in.
struct Cursor<'a> {
    values: &'a [f64],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(values: &'a [f64]) -> Self {
        Self { values, pos: 0 }
    }

    fn take(&mut self, table: &'static str, n: usize) -> Result<Vec<f64>, LutError> {
        if self.pos + n > self.values.len() {
            return Err(LutError::MissingNode {
                table,
                expected: n,
                found: self.values.len() - self.pos,
            });
        }
        let out = self.values[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Ok(out)
    }

    fn take_counts(&mut self, table: &'static str, n: usize) -> Result<Vec<usize>, LutError> {
        self.take(table, n)?
            .into_iter()
            .map(|v| {
                if v.is_finite() && v >= 0.0 {
                    Ok(v.round() as usize)
                } else {
                    Err(LutError::Range { what: table, value: v })
                }
            })
            .collect()
    }

    fn count(&mut self, table: &'static str) -> Result<usize, LutError> {
        Ok(self.take_counts(table, 1)?[0])
    }
}

#[cfg(test)]
pub(crate) fn demo_parts(nbands: usize) -> LegacyTableParts {
    // Tables that are linear in every axis, so multilinear interpolation
    // reproduces the generating functions exactly.
    let tpres = vec![600.0, 700.0, 800.0, 900.0, PRES_REF];
    let ttv = vec![0.0, 15.0, 30.0, 45.0, 60.0, 75.0];
    let nview = ttv.len();
    let row_nodes = [0.0, 20.0, 40.0, 60.0, 80.0];
    let nbfi = vec![row_nodes.len(); nview];
    let nbfic: Vec<usize> = (0..nview).map(|iv| iv * row_nodes.len()).collect();
    let tts: Vec<f64> = (0..nview).flat_map(|_| row_nodes).collect();

    let mut rolutt = Vec::new();
    let mut transt = Vec::new();
    let mut sphalbt = Vec::new();
    let mut normext = Vec::new();
    for b in 0..nbands {
        for &p in &tpres {
            for &a in &AOT_GRID {
                for (iv, _) in ttv.iter().enumerate() {
                    for &ts in &row_nodes {
                        rolutt.push(rolutt_fn(b, p, a, ts, ttv[iv]));
                    }
                }
                for &tv in &ttv {
                    transt.push(transt_fn(b, p, a, tv));
                }
                sphalbt.push(0.05 + 0.01 * a + 1.0e-6 * p);
                normext.push(1.0 + 0.05 * b as f64 - 0.01 * a);
            }
        }
    }

    LegacyTableParts {
        nbands,
        tpres,
        ttv,
        tsmin: vec![0.0; nview],
        tsmax: vec![80.0; nview],
        nbfi,
        nbfic,
        tts,
        rolutt,
        transt,
        sphalbt,
        normext,
        tauray: (0..nbands).map(|b| 0.23 / (1.0 + b as f64)).collect(),
        ogtransa1: vec![4.0e-5; nbands],
        ogtransb0: vec![0.1; nbands],
        ogtransb1: vec![0.05; nbands],
        wvtransa: vec![-2.0; nbands],
        wvtransb: vec![0.7; nbands],
        oztransa: vec![-0.085; nbands],
    }
}

#[cfg(test)]
pub(crate) fn rolutt_fn(band: usize, p: f64, a: f64, ts: f64, tv: f64) -> f64 {
    0.02 + 0.002 * band as f64 + 0.01 * a + 1.0e-5 * p + 2.0e-4 * ts + 1.0e-4 * tv
}

#[cfg(test)]
pub(crate) fn transt_fn(band: usize, p: f64, a: f64, ang: f64) -> f64 {
    0.95 - 0.001 * band as f64 - 0.02 * a - 1.0e-5 * p - 5.0e-4 * ang
}

#[cfg(test)]
pub(crate) fn demo_tables(nbands: usize) -> LegacyLutTables {
    LegacyLutTables::from_parts(demo_parts(nbands)).unwrap()
}
