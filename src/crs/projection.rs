//! Inverse Transverse Mercator projection on the WGS84 ellipsoid.
//!
//! Implements the standard series expansion (Snyder, *Map Projections: A
//! Working Manual*, USGS PP 1395, eqs. 8-18 through 8-25) for converting
//! projected easting/northing back to geographic longitude/latitude. Both
//! projected systems the engine recognizes are Transverse Mercator variants
//! that differ only in their parameter sets.

/// WGS84 semi-major axis in metres.
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;

/// WGS84 first eccentricity squared, from flattening 1/298.257223563.
const ECCENTRICITY_SQ: f64 = 0.006_694_379_990_141_316;

/// Parameters distinguishing one Transverse Mercator grid from another.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TmParameters {
    /// Central meridian in degrees east.
    pub central_meridian: f64,
    /// Scale factor on the central meridian.
    pub scale_factor: f64,
    /// False easting in metres.
    pub false_easting: f64,
    /// False northing in metres.
    pub false_northing: f64,
}

/// UTM zone 38N (EPSG:32638), covering longitudes 42°E to 48°E.
pub(crate) const UTM_ZONE_38N: TmParameters = TmParameters {
    central_meridian: 45.0,
    scale_factor: 0.9996,
    false_easting: 500_000.0,
    false_northing: 0.0,
};

/// National Transverse Mercator grid centred on the country's extent.
pub(crate) const YEMEN_TM: TmParameters = TmParameters {
    central_meridian: 47.5,
    scale_factor: 1.0,
    false_easting: 1_500_000.0,
    false_northing: 0.0,
};

/// Converts projected metres to a `(longitude, latitude)` pair in degrees.
pub(crate) fn inverse_transverse_mercator(x: f64, y: f64, params: &TmParameters) -> (f64, f64) {
    let e2 = ECCENTRICITY_SQ;
    let ep2 = e2 / (1.0 - e2);

    // Footpoint latitude from the rectifying meridian arc.
    let m = (y - params.false_northing) / params.scale_factor;
    let mu = m
        / (SEMI_MAJOR_AXIS
            * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0));
    let sqrt_one_minus_e2 = (1.0 - e2).sqrt();
    let e1 = (1.0 - sqrt_one_minus_e2) / (1.0 + sqrt_one_minus_e2);
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let c1 = ep2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let denom = 1.0 - e2 * sin_phi1 * sin_phi1;
    let n1 = SEMI_MAJOR_AXIS / denom.sqrt();
    let r1 = SEMI_MAJOR_AXIS * (1.0 - e2) / denom.powf(1.5);
    let d = (x - params.false_easting) / (n1 * params.scale_factor);

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);

    let lon = params.central_meridian.to_radians()
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / cos_phi1;

    (lon.to_degrees(), lat.to_degrees())
}
