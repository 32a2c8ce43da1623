/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

pub use calculator::Calculator;
pub use counter::counter;
pub use echo::Echo;
pub use handoff::{forwarder, observer, Timeline};
pub use lifecycle_probe::{lifecycle_probe, Probe};
pub use pool_worker::PoolWorker;
pub use recorder::recorder;
pub use relay::relay;
pub use sentinel::Sentinel;
pub use staller::staller;
pub use ticker::ticker;

mod calculator;
mod counter;
mod echo;
mod handoff;
mod lifecycle_probe;
mod pool_worker;
mod recorder;
mod relay;
mod sentinel;
mod staller;
mod ticker;
