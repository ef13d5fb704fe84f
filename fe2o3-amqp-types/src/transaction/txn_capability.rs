symbol_enum! {
    /// 4.5.7 Transaction Capability
    /// Symbols indicating (desired/available) capabilities of a transaction coordinator.
    /// <type name="txn-capability" class="restricted" source="symbol" provides="txn-capability">
    ///     <choice name="local-transactions" value="amqp:local-transactions"/>
    ///     <choice name="distributed-transactions" value="amqp:distributed-transactions"/>
    ///     <choice name="promotable-transactions" value="amqp:promotable-transactions"/>
    ///     <choice name="multi-txns-per-ssn" value="amqp:multi-txns-per-ssn"/>
    ///     <choice name="multi-ssns-per-txn" value="amqp:multi-ssns-per-txn"/>
    /// </type>
    pub enum TxnCapability {
        /// Support local transactions
        LocalTransactions => "amqp:local-transactions",

        /// Support AMQP Distributed Transactions
        DistributedTransactions => "amqp:distributed-transactions",

        /// Support AMQP Promotable Transactions
        PromotableTransactions => "amqp:promotable-transactions",

        /// Support multiple active transactions on a single session
        MultiTxnsPerSsn => "amqp:multi-txns-per-ssn",

        /// Support transactions whose txn-id is used across sessions on one connection
        MultiSsnsPerTxn => "amqp:multi-ssns-per-txn",
    }
}
