use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sources::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sources::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Sources::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Sources::Uri).string().not_null())
                    .col(ColumnDef::new(Sources::SourceType).string().not_null())
                    .col(
                        ColumnDef::new(Sources::CheckIntervalSecs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Sources::LastCheckedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Sources::NextDueAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sources::ConsecutiveFailures)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Sources::Degraded)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Sources::LastError).text())
                    .col(
                        ColumnDef::new(Sources::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Sources::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Sources::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sources_deleted_next_due")
                    .table(Sources::Table)
                    .col(Sources::DeletedAt)
                    .col(Sources::NextDueAt)
                    .to_owned(),
            )
            .await?;

        // 仅在存活记录之间保证 uri 唯一；软删除的记录可以与新登记的来源共用同一 uri
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_sources_live_uri ON sources (uri) WHERE deleted_at IS NULL",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Sources::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Sources {
    Table,
    Id,
    Version,
    Uri,
    SourceType,
    CheckIntervalSecs,
    LastCheckedAt,
    NextDueAt,
    ConsecutiveFailures,
    Degraded,
    LastError,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}
