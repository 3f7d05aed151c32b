use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Articles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Articles::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Articles::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Articles::SourceId).uuid().not_null())
                    .col(ColumnDef::new(Articles::NaturalKey).string().not_null())
                    .col(ColumnDef::new(Articles::Title).string().not_null())
                    .col(ColumnDef::new(Articles::Uri).string().not_null())
                    .col(ColumnDef::new(Articles::Description).text())
                    .col(ColumnDef::new(Articles::ContentHash).string())
                    .col(
                        ColumnDef::new(Articles::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Articles::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Articles::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_articles_source_natural_key")
                    .table(Articles::Table)
                    .col(Articles::SourceId)
                    .col(Articles::NaturalKey)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WatchLogs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(WatchLogs::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(WatchLogs::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(WatchLogs::SourceId).uuid().not_null())
                    .col(ColumnDef::new(WatchLogs::PreviousId).uuid())
                    .col(ColumnDef::new(WatchLogs::ContentHash).string().not_null())
                    .col(
                        ColumnDef::new(WatchLogs::ItemsCreated)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(WatchLogs::ItemsUpdated)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(WatchLogs::ItemsVanished)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(WatchLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(WatchLogs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(WatchLogs::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_watch_logs_source_created")
                    .table(WatchLogs::Table)
                    .col(WatchLogs::SourceId)
                    .col(WatchLogs::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WatchLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Articles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Articles {
    Table,
    Id,
    Version,
    SourceId,
    NaturalKey,
    Title,
    Uri,
    Description,
    ContentHash,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum WatchLogs {
    Table,
    Id,
    Version,
    SourceId,
    PreviousId,
    ContentHash,
    ItemsCreated,
    ItemsUpdated,
    ItemsVanished,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}
