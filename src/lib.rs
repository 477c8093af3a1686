/*!
Position based fluids: particles are advanced by projecting predicted positions onto a
density constraint, followed by vorticity confinement and XSPH viscosity.

```no_run
use pbf_fluid::{collision::Plane, vec3f, Fluid, FluidConfig, FrameParams};

let mut fluid = Fluid::new(FluidConfig::default(), false);
let floor = Plane::new(vec3f(0., -0.05, 0.), vec3f(0., 1., 0.));
for _ in 0..60 {
    fluid.simulate(60., 1, &FrameParams::default(), &[vec3f(0., -9.8, 0.)], &[&floor]);
}
```
*/

mod platform;
mod simulation;

pub use simulation::*;

#[cfg(not(target_arch = "wasm32"))]
pub use platform::start;
