use crate::aerosol::pixel::{PixelInputs, RetrievalResult};
use crate::aerosol::retrieval::AerosolRetriever;
use crate::lut::LutError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

/// Data-parallel driver for the per-pixel retrieval. Pixels are cut into
/// contiguous tiles and the tiles are pre-assigned to workers by range, one
/// contiguous span per worker, so each worker's completed tiles form a
/// prefix of its span. The output preserves input order. The LUT stores are
/// shared read-only through the retriever's borrows, so no copies are made
/// per worker.
#[derive(Debug)]
pub struct TileProcessor<'a> {
    retriever: AerosolRetriever<'a>,
    tile_size: usize,
    workers: usize,
}

impl<'a> TileProcessor<'a> {
    pub fn new(retriever: AerosolRetriever<'a>, tile_size: usize, workers: usize) -> Self {
        Self {
            retriever,
            tile_size: tile_size.max(1),
            workers: workers.max(1),
        }
    }

    /// Process `pixels` across the worker pool. Cancellation is cooperative
    /// at tile boundaries: once `cancel` is raised, workers finish their
    /// current tile and stop, and the contiguous completed prefix of the
    /// output is returned. A legacy-kernel lookup failure aborts the run
    /// with the error.
    pub fn process(
        &self,
        pixels: &[PixelInputs],
        cancel: &AtomicBool,
    ) -> Result<Vec<RetrievalResult>, LutError> {
        if pixels.is_empty() {
            return Ok(Vec::new());
        }

        let tiles: Vec<&[PixelInputs]> = pixels.chunks(self.tile_size).collect();
        let per_worker = tiles.len().div_ceil(self.workers);
        let (tx, rx) = mpsc::channel::<(usize, Result<Vec<RetrievalResult>, LutError>)>();

        thread::scope(|scope| {
            for (w, assigned) in tiles.chunks(per_worker).enumerate() {
                let tx = tx.clone();
                let retriever = &self.retriever;
                scope.spawn(move || {
                    // The warm-start hint lives on the worker and is carried
                    // through its sequential pixel loop.
                    let mut iaots = 0usize;
                    for (offset, tile) in assigned.iter().enumerate() {
                        if cancel.load(Ordering::Relaxed) {
                            break;
                        }
                        let t = w * per_worker + offset;

                        let mut out = Vec::with_capacity(tile.len());
                        let mut failure = None;
                        for pixel in *tile {
                            match retriever.retrieve(pixel, iaots) {
                                Ok(res) => {
                                    iaots = res.iaots;
                                    out.push(res);
                                }
                                Err(e) => {
                                    failure = Some(e);
                                    break;
                                }
                            }
                        }

                        match failure {
                            Some(e) => {
                                let _ = tx.send((t, Err(e)));
                                break;
                            }
                            None => {
                                if tx.send((t, Ok(out))).is_err() {
                                    break;
                                }
                            }
                        }
                    }
                });
            }
        });
        drop(tx);

        let mut slots: Vec<Option<Vec<RetrievalResult>>> =
            (0..tiles.len()).map(|_| None).collect();
        for (t, outcome) in rx {
            slots[t] = Some(outcome?);
        }

        Ok(assemble(slots, pixels.len()))
    }

    /// Single-threaded reference loop, one warm-start scalar end to end.
    pub fn process_sequential(
        &self,
        pixels: &[PixelInputs],
    ) -> Result<Vec<RetrievalResult>, LutError> {
        let mut iaots = 0usize;
        let mut out = Vec::with_capacity(pixels.len());
        for pixel in pixels {
            let res = self.retriever.retrieve(pixel, iaots)?;
            iaots = res.iaots;
            out.push(res);
        }
        Ok(out)
    }
}

/// Flatten completed tiles in index order, stopping at the first gap: a
/// cancelled run keeps only the contiguous completed prefix.
fn assemble(slots: Vec<Option<Vec<RetrievalResult>>>, capacity: usize) -> Vec<RetrievalResult> {
    let mut results = Vec::with_capacity(capacity);
    for slot in slots {
        match slot {
            Some(tile) => results.extend(tile),
            None => break,
        }
    }
    results
}
