use deepbrot_core::Answer;

use crate::tile::Level;

/// Per-pixel values of one level of a job.
///
/// This is the raw output of the pipeline before colouring: 2 marks
/// interior points, anything else is an (optionally smoothed) escape count.
/// Pixels not yet computed hold 0.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelRaster {
    pub job_id: u64,
    pub level: usize,
    pub pixel_size: u32,
    pub width: u32,
    pub height: u32,
    pub values: Vec<i32>,
    pub smooth: Option<Vec<u8>>,
}

impl LevelRaster {
    pub fn new(job_id: u64, level: &Level, smooth: bool) -> Self {
        let size = level.pixel_count();
        Self {
            job_id,
            level: level.index,
            pixel_size: level.pixel_size,
            width: level.width,
            height: level.height,
            values: vec![0; size],
            smooth: smooth.then(|| vec![0; size]),
        }
    }

    #[inline]
    pub fn value_at(&self, x: u32, y: u32) -> i32 {
        self.values[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn smooth_at(&self, x: u32, y: u32) -> u8 {
        self.smooth
            .as_ref()
            .map_or(0, |s| s[(y * self.width + x) as usize])
    }

    /// Copy the computed pixels of an answer into place. Pixels the task
    /// left for seeding keep their current value.
    pub fn blit_answer(&mut self, answer: &Answer) {
        let task = &answer.task;
        for py in 0..task.height {
            let buf_y = task.y_offset + py;
            if buf_y >= self.height {
                break;
            }
            for px in 0..task.width {
                let buf_x = task.x_offset + px;
                if buf_x >= self.width {
                    break;
                }
                if task.is_seeded(px, py) {
                    continue;
                }
                let src = (py * task.width + px) as usize;
                let dst = (buf_y * self.width + buf_x) as usize;
                self.values[dst] = answer.values[src];
                if let (Some(dst_smooth), Some(src_smooth)) = (&mut self.smooth, &answer.smooth) {
                    dst_smooth[dst] = src_smooth[src];
                }
            }
        }
    }

    /// Fill every even-row, even-column pixel from the coarser level whose
    /// pixels are twice as large: `self[y][x] = coarser[y / 2][x / 2]`.
    pub fn seed_from_coarser(&mut self, coarser: &LevelRaster) {
        for y in (0..self.height).step_by(2) {
            let cy = y / 2;
            if cy >= coarser.height {
                break;
            }
            for x in (0..self.width).step_by(2) {
                let cx = x / 2;
                if cx >= coarser.width {
                    break;
                }
                let dst = (y * self.width + x) as usize;
                self.values[dst] = coarser.value_at(cx, cy);
                if let Some(smooth) = &mut self.smooth {
                    smooth[dst] = coarser.smooth_at(cx, cy);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepbrot_core::{ComplexPoint, JobToken, Task, TaskStats};

    fn level(index: usize, pixel_size: u32, width: u32, height: u32) -> Level {
        Level {
            index,
            pixel_size,
            width,
            height,
        }
    }

    fn answer(x: u32, y: u32, w: u32, h: u32, skip: bool, values: Vec<i32>) -> Answer {
        Answer {
            task: Task {
                job_id: 1,
                token: JobToken::detached(),
                level: 1,
                pixel_size: 1,
                x_offset: x,
                y_offset: y,
                width: w,
                height: h,
                frame_width: 8,
                frame_height: 8,
                frame_top_left: ComplexPoint::zero(64),
                frame_bottom_right: ComplexPoint::zero(64),
                max_iterations: 100,
                smooth: false,
                precision: 64,
                required_precision: 10,
                param_hash: "100-false".into(),
                reset_caches: false,
                skip_checkerboard: skip,
            },
            values,
            smooth: None,
            stats: TaskStats::default(),
            completed: true,
        }
    }

    #[test]
    fn blit_places_tile() {
        let mut raster = LevelRaster::new(1, &level(0, 1, 4, 4), false);
        raster.blit_answer(&answer(2, 2, 2, 2, false, vec![5, 6, 7, 8]));
        assert_eq!(raster.value_at(2, 2), 5);
        assert_eq!(raster.value_at(3, 2), 6);
        assert_eq!(raster.value_at(2, 3), 7);
        assert_eq!(raster.value_at(3, 3), 8);
        assert_eq!(raster.value_at(0, 0), 0);
    }

    #[test]
    fn blit_keeps_seeded_pixels() {
        let mut raster = LevelRaster::new(1, &level(1, 1, 2, 2), false);
        raster.values[0] = 42;
        raster.blit_answer(&answer(0, 0, 2, 2, true, vec![0, 5, 6, 7]));
        assert_eq!(raster.values, vec![42, 5, 6, 7]);
    }

    #[test]
    fn seed_copies_even_pixels() {
        let mut coarse = LevelRaster::new(1, &level(0, 2, 2, 2), true);
        coarse.values = vec![10, 11, 12, 13];
        coarse.smooth = Some(vec![1, 2, 3, 4]);

        let mut fine = LevelRaster::new(1, &level(1, 1, 3, 3), true);
        fine.seed_from_coarser(&coarse);
        assert_eq!(fine.values, vec![10, 0, 11, 0, 0, 0, 12, 0, 13]);
        assert_eq!(fine.smooth, Some(vec![1, 0, 2, 0, 0, 0, 3, 0, 4]));
    }
}
