//! Pipeline components
//!
//! Each stage of the per-reference pipeline lives in its own module; the
//! external backends (yt-dlp, MusicBrainz) sit behind traits so the
//! orchestrator can be driven by fakes in tests.

pub mod admission;
pub mod error_sink;
pub mod info_prober;
pub mod media_fetcher;
pub mod metadata_enricher;
pub mod musicbrainz_client;
pub mod reference_loader;
pub mod row_assembler;
pub mod table_writer;
pub mod ytdlp;

pub use admission::{evaluate, AdmissionDecision, RejectReason, UnknownDurationPolicy};
pub use error_sink::{ErrorLogEntry, ErrorSink};
pub use info_prober::{probe_info, InfoProber, ProbeError, RawMediaInfo};
pub use media_fetcher::{artifact_path, AcquisitionError, MediaAcquirer};
pub use metadata_enricher::{Enrichment, FallbackReason, MatchPolicy, MetadataEnricher};
pub use musicbrainz_client::{CatalogError, CatalogLookup, CatalogMatch, MusicBrainzClient};
pub use reference_loader::load_references;
pub use row_assembler::assemble_row;
pub use table_writer::{write_table, OutputError, TableFormat};
pub use ytdlp::YtDlp;
