//! Aerosol retrieval and Lambertian atmospheric correction for Landsat-8/9
//! and Sentinel-2 surface reflectance processing.
//!
//! Given top-of-atmosphere reflectances for one pixel and pre-tabulated
//! atmospheric coefficients, the crate searches for the aerosol optical
//! thickness at 550 nm that best reconciles the observed inter-band ratios
//! with the radiative-transfer model, and inverts the model to Lambertian
//! surface reflectance.

pub mod aerosol;
pub mod config;
pub mod lut;
pub mod sat_bands;
