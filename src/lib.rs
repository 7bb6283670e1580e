//! # acceptance-steps - Passos de Teste de Aceitação
//!
//! Passos de teste adiados, descritíveis e de execução única, usados para
//! preparar o estado compartilhado de uma aplicação (rede, persistência e
//! apresentação de telas) antes de um teste de aceitação.
//!
//! ## Para todos entenderem:
//!
//! Pense numa peça de teatro. Antes da cena começar, alguém precisa montar
//! o cenário: colocar a mesa, acender a luz certa, deixar a porta fechada.
//! Cada [`Step`] é uma dessas tarefas de montagem, escrita num cartão.
//! Escrever o cartão não muda nada no palco; só quando o contra-regra
//! (o [`SequentialRunner`]) lê o cartão é que a mesa é colocada.
//!
//! ## Fluxo:
//!
//! ```text
//! StepFactory::step_to_* ──> Step (pending) ──> SequentialRunner ──> RunReport
//!        │                                 run()
//!        └── captura Arc<ObjectManager>, fixtures, factories,
//!            contexto de persistência e apresentador (opcionais)
//! ```
//!
//! Construir um step nunca toca o estado compartilhado. Tudo acontece em
//! [`Step::run`](step::TestStep::run), e qualquer falha dentro da ação vira
//! um [`StepOutcome`] em vez de escapar do loop do runner.

pub mod client;
pub mod config;
pub mod errors;
pub mod factory;
pub mod fixtures;
pub mod objects;
pub mod persistence;
pub mod presentation;
pub mod runner;
pub mod scenario;
pub mod step;
pub mod telemetry;

pub use client::{ObjectManager, ReachabilityStatus};
pub use config::StepsConfig;
pub use errors::{ErrorCode, StepError};
pub use factory::StepFactory;
pub use runner::{RunReport, SequentialRunner};
pub use step::{Step, StepOutcome, TestStep};
