use crate::domain::model::{AccumulatedTable, CanonicalTable, TableTarget};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 目的資料表的寫入端。每次呼叫都必須整張取代 (drop and recreate)。
pub trait TableSink: Send + Sync {
    fn replace_table(
        &self,
        target: &TableTarget,
        table: &CanonicalTable,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[async_trait]
pub trait Pipeline: Send {
    async fn extract(&mut self) -> Result<AccumulatedTable>;
    async fn transform(&mut self, data: AccumulatedTable) -> Result<CanonicalTable>;
    async fn load(&mut self, table: CanonicalTable) -> Result<String>;
}
