pub mod config;
pub mod dispatch;
pub mod publish;
pub mod topic;

// Публичный экспорт всех типов ошибок из вложенных модулей, чтобы упростить
// доступ к ним из внешнего кода.
pub use config::*;
pub use dispatch::*;
pub use publish::*;
pub use topic::*;
