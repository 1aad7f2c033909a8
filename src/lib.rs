//! report-weaver: turn long documents into structured, content-filled
//! report skeletons.
//!
//! A document flows through the pipeline in five stages:
//!
//! ```text
//!   file ──▶ loader ──▶ splitter ──▶ embedding ──▶ vector store
//!                          │
//!                          └──▶ batch ──▶ skeleton (LLM analysis)
//!                                            │
//!                                            ▼
//!                              resolver (retrieve + rerank) ──▶ report
//! ```
//!
//! | Module      | Responsibility                                        |
//! |-------------|-------------------------------------------------------|
//! | [`loader`]  | Extract text from TXT/MD/DOCX/PDF files               |
//! | [`splitter`]| Semantic chunking with overlap                        |
//! | [`batch`]   | Pack chunks into analysis-sized batches               |
//! | [`oracle`]  | Chat-completion client behind a trait seam            |
//! | [`analysis`]| Parse model JSON (fence stripping, lenient defaults)  |
//! | [`skeleton`]| Incremental, additive outline construction            |
//! | [`embedding`]| Passage and query embedding via the companion API    |
//! | [`store`]   | Vector storage (Qdrant REST, in-memory)               |
//! | [`rerank`]  | Second-stage candidate reordering                     |
//! | [`resolver`]| Fill sections with retrieved context                  |
//! | [`pipeline`]| Wire the stages into end-to-end runs                  |

pub mod analysis;
pub mod batch;
pub mod config;
pub mod embedding;
pub mod error;
pub mod loader;
pub mod models;
pub mod oracle;
pub mod pipeline;
pub mod rerank;
pub mod resolver;
pub mod skeleton;
pub mod splitter;
pub mod store;
