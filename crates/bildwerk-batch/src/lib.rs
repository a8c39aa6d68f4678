// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildwerk-batch: Multi-image intake, per-item compression, bulk export,
// and the preview handles and selection state that go with them.

pub mod coordinator;
pub mod preview;
pub mod selection;

pub use coordinator::{BatchCoordinator, BatchItem, CompressAllReport, ExportBundle, Intake};
pub use preview::{PreviewHandle, PreviewStore};
pub use selection::ActiveSelection;
