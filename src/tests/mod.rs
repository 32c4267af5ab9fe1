// 文件: tests/mod.rs
// 作用: 引擎行为测试的入口。


mod properties;
