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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mailroom::prelude::*;
use parking_lot::Mutex;

/// Shared record of the hooks a probe service has run.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    pub started: Arc<AtomicUsize>,
    pub saves: Arc<AtomicUsize>,
    pub stopped: Arc<Mutex<Option<ShutdownMode>>>,
}

/// A service that reports its lifecycle hooks into `probe`.
pub fn lifecycle_probe(probe: Probe) -> ServiceDef<Probe> {
    ServiceDef::new("probe", probe)
        .act_on(MethodInfo::new("ping").returns("String"), |_, _| {
            Reply::json("pong")
        })
        .after_start(|probe, _outbox| {
            probe.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .on_save(|probe| {
            probe.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .before_stop(|probe, mode| {
            *probe.stopped.lock() = Some(mode);
        })
}
