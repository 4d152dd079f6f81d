// agents.rs - Active corner search with a grid of perceptron agents.
//
// An alternative to the Harris scan for producing trackable points.
// Instead of scoring every pixel, a handful of agents walk over the image
// and each decides, from the gradients under its feet, where to step next
// and whether to stop.
//
//   1. Spawn grid_rows x grid_rows agents on a regular grid inset by
//      `border` pixels. Positions are kept in 1/resolution pixel units.
//   2. Each time step, every active agent:
//        - senses the 5x5 gradient patch at its pixel position: 25 dx
//          values, then 25 dy values, then a bias of 255 (51 inputs,
//          patch visited column by column)
//        - runs a fixed 3x51 perceptron: a = sum(w * in) / (25500/res) / 2,
//          saturated to +-res
//        - stops if a[2] < 0, otherwise moves by (a[0], a[1]) * max_jump
//        - wraps to the opposite side when it leaves the band
//          [half_patch + 1, dim - half_patch - 2]
//   3. Stop after `time_steps`, or once no agent is active.
//
// The weights were evolved offline for 8-bit luma and a 5x5 patch; they
// are data, not tunables.

use log::debug;

use crate::config::AgentConfig;
use crate::error::{try_with_capacity, FlowResult};
use crate::gradient::gradient_at;
use crate::image::{Image, Point};

/// Perceptron inputs: 25 dx + 25 dy + bias.
pub const N_VISUAL_INPUTS: usize = 51;

/// Perceptron outputs: move x, move y, keep going.
pub const N_ACTIONS: usize = 3;

/// Input value of the bias neuron.
pub const BIAS_INPUT: i32 = 255;

/// Row-major `[action][input]` weights in [-100, 100].
#[rustfmt::skip]
pub const AGENT_WEIGHTS: [i32; N_ACTIONS * N_VISUAL_INPUTS] = [
    -78, -46, 18, 59, 0, 100, 0, 0, 100, -29, -45, 0, 15, -30, 59, -100, -99,
    -100, -47, 0, -100, -100, 2, -78, 0, 10, -68, 53, 0, 0, -61, -28, 51,
    0, -86, -73, 10, -65, -100, 98, -19, 63, -100, -42, -83, 21, 0, 3, 7,
    0, -100,
    24, -100, -99, -40, -100, 91, 0, 0, 54, 0, -90, -22, 13, 6, 31, 0,
    100, -58, -31, 100, 5, 21, -100, 37, -100, 57, 100, -96, -3, -74, -3, -64,
    -68, 6, -100, -71, -81, 100, 13, 100, 0, -100, -57, 77, -100, -61, -100, 0,
    37, -100, -100,
    -100, 10, -36, -100, 62, 8, 0, 21, 2, -61, -5, 32, -64, 15, -100, -90,
    -74, -18, -22, -28, 42, -92, 0, 3, -3, -13, 100, -5, 88, 0, 7, -100,
    90, 73, -53, 100, 0, 2, 0, -95, -60, -62, 0, -6, 82, 0, -79, -69,
    73, -38, 100,
];

/// One searching agent. Coordinates are in `1 / resolution` pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Agent {
    pub x: i32,
    pub y: i32,
    pub active: bool,
}

impl Agent {
    /// Pixel position (truncating).
    #[inline]
    pub fn pixel(&self, resolution: i32) -> Point {
        Point::new(self.x / resolution, self.y / resolution)
    }
}

/// Fill `inputs` with the gradient patch around (x, y).
pub fn sense(luma: &Image<u8>, x: i32, y: i32, half_patch: usize, inputs: &mut [i32; N_VISUAL_INPUTS]) {
    let hp = half_patch as i32;
    let half = N_VISUAL_INPUTS / 2;
    let mut i = 0;
    for xx in x - hp..=x + hp {
        for yy in y - hp..=y + hp {
            let (dx, dy) = gradient_at(luma, xx, yy);
            inputs[i] = dx;
            inputs[half + i] = dy;
            i += 1;
        }
    }
    inputs[N_VISUAL_INPUTS - 1] = BIAS_INPUT;
}

/// Run the perceptron. Each action lies in `[-resolution, resolution]`.
pub fn decide(inputs: &[i32; N_VISUAL_INPUTS], resolution: i32) -> [i32; N_ACTIONS] {
    let factor = 25_500 / resolution;
    let mut actions = [0; N_ACTIONS];
    for (a, w) in actions.iter_mut().zip(AGENT_WEIGHTS.chunks_exact(N_VISUAL_INPUTS)) {
        let sum: i32 = w.iter().zip(inputs).map(|(w, v)| w * v).sum();
        *a = (sum / factor / 2).clamp(-resolution, resolution);
    }
    actions
}

/// Grid-of-agents point finder.
pub struct ActiveCornerSearch {
    config: AgentConfig,
    agents: Vec<Agent>,
}

impl ActiveCornerSearch {
    pub fn new(config: AgentConfig) -> FlowResult<Self> {
        config.validate()?;
        let n = config.grid_rows * config.grid_rows;
        Ok(ActiveCornerSearch {
            config,
            agents: try_with_capacity(n, "agent pool")?,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Agents as left by the last search.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Place the agents on the start grid. Returns false if the image is
    /// too small to hold the grid and the wrap band.
    fn spawn(&mut self, width: usize, height: usize) -> bool {
        let cfg = &self.config;
        let min_band = 2 * cfg.half_patch + 4;
        if width <= 2 * cfg.border || height <= 2 * cfg.border || width < min_band || height < min_band {
            return false;
        }
        let step_x = (width - 2 * cfg.border) / (cfg.grid_rows - 1);
        let step_y = (height - 2 * cfg.border) / (cfg.grid_rows - 1);
        let res = cfg.resolution;

        self.agents.clear();
        for gr in 0..cfg.grid_rows {
            for gc in 0..cfg.grid_rows {
                self.agents.push(Agent {
                    x: ((cfg.border + gr * step_x) as i32) * res,
                    y: ((cfg.border + gc * step_y) as i32) * res,
                    active: true,
                });
            }
        }
        true
    }

    /// Let the agents search `luma` and return their final pixel positions
    /// (or only the stopped agents', per `only_stopped`).
    pub fn search(&mut self, luma: &Image<u8>) -> FlowResult<Vec<Point>> {
        if !self.spawn(luma.width(), luma.height()) {
            debug!("agent search skipped: image {} too small", luma.dims());
            return Ok(Vec::new());
        }

        let cfg = &self.config;
        let res = cfg.resolution;
        let lo = cfg.half_patch as i32 + 1;
        let hi_x = luma.width() as i32 - cfg.half_patch as i32 - 2;
        let hi_y = luma.height() as i32 - cfg.half_patch as i32 - 2;
        let mut inputs = [0; N_VISUAL_INPUTS];

        let mut t = 0;
        loop {
            let mut n_active = 0;
            for agent in self.agents.iter_mut().filter(|a| a.active) {
                n_active += 1;
                let p = agent.pixel(res);
                sense(luma, p.x, p.y, cfg.half_patch, &mut inputs);
                let actions = decide(&inputs, res);

                if actions[2] < 0 {
                    agent.active = false;
                    continue;
                }

                agent.x = agent.x.saturating_add(actions[0] * cfg.max_jump);
                agent.y = agent.y.saturating_add(actions[1] * cfg.max_jump);
                agent.x = wrap(agent.x, res, lo, hi_x);
                agent.y = wrap(agent.y, res, lo, hi_y);
            }

            t += 1;
            if t >= cfg.time_steps || n_active == 0 {
                break;
            }
        }

        let mut points = try_with_capacity(self.agents.len(), "agent points")?;
        points.extend(
            self.agents
                .iter()
                .filter(|a| !cfg.only_stopped || !a.active)
                .map(|a| a.pixel(res)),
        );
        debug!(
            "agent search finished after {t} steps: {} of {} agents stopped",
            self.agents.iter().filter(|a| !a.active).count(),
            self.agents.len()
        );
        Ok(points)
    }
}

/// Send a coordinate that left `[lo, hi]` (pixels) to the opposite edge.
#[inline]
fn wrap(v: i32, res: i32, lo: i32, hi: i32) -> i32 {
    let px = v / res;
    if px < lo {
        hi * res
    } else if px > hi {
        lo * res
    } else {
        v
    }
}
